use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Accept a JSON number or a decimal string (`"0.0000125"`) as `f64`.
///
/// The info endpoint encodes prices, sizes and rates as strings.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("number out of range")),
        Value::String(s) => s.trim().parse::<f64>().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!(
            "expected number or numeric string, got {}",
            other
        ))),
    }
}
