use serde::{Deserialize, Serialize};

use super::record::{DatasetKind, Record};
use super::request::InfoRequest;
use crate::utils::de::lenient_f64;

/// A single OHLCV candle as returned by `candleSnapshot`.
#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    /// Open time (ms).
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o", deserialize_with = "lenient_f64")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "lenient_f64")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "lenient_f64")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "lenient_f64")]
    pub close: f64,
    /// Base-asset volume.
    #[serde(rename = "v", deserialize_with = "lenient_f64")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: u64,
}

/// Hourly price and USD volume for a coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub coin: String,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume_usd: f64,
    pub trade_count: u64,
    pub time: i64,
}

impl Record for VolumeRecord {
    const KIND: DatasetKind = DatasetKind::Volume;
    const COLUMNS: &'static [&'static str] = &[
        "coin",
        "open_price",
        "high_price",
        "low_price",
        "close_price",
        "volume_usd",
        "trade_count",
        "time",
    ];
    type Raw = Candle;

    fn coin(&self) -> &str {
        &self.coin
    }

    fn time(&self) -> i64 {
        self.time
    }

    fn request(coin: &str, start_ms: i64, end_ms: i64) -> InfoRequest {
        InfoRequest::hourly_candles(coin, start_ms, end_ms)
    }

    fn from_raw(coin: &str, candle: Candle) -> Self {
        VolumeRecord {
            coin: coin.to_string(),
            open_price: candle.open,
            high_price: candle.high,
            low_price: candle.low,
            close_price: candle.close,
            volume_usd: candle.volume * candle.close,
            trade_count: candle.trade_count,
            time: candle.open_time,
        }
    }

    fn describe(records: &[Self]) -> String {
        let total: f64 = records.iter().map(|r| r.volume_usd).sum();
        format!("${:.2} across {} hourly periods", total, records.len())
    }
}
