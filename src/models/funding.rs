use serde::{Deserialize, Serialize};

use super::record::{DatasetKind, Record};
use super::request::InfoRequest;
use crate::utils::de::lenient_f64;

/// One hourly funding payment rate for a coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRecord {
    pub coin: String,
    #[serde(rename = "fundingRate")]
    pub funding_rate: f64,
    pub time: i64,
}

/// Entry of a `fundingHistory` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingHistoryEntry {
    #[serde(default)]
    pub coin: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub funding_rate: f64,
    pub time: i64,
}

impl Record for FundingRecord {
    const KIND: DatasetKind = DatasetKind::Funding;
    const COLUMNS: &'static [&'static str] = &["coin", "fundingRate", "time"];
    type Raw = FundingHistoryEntry;

    fn coin(&self) -> &str {
        &self.coin
    }

    fn time(&self) -> i64 {
        self.time
    }

    // fundingHistory is open-ended; the caller trims to the end bound.
    fn request(coin: &str, start_ms: i64, _end_ms: i64) -> InfoRequest {
        InfoRequest::funding_history(coin, start_ms)
    }

    fn from_raw(coin: &str, raw: FundingHistoryEntry) -> Self {
        let coin = if raw.coin.is_empty() {
            coin.to_string()
        } else {
            raw.coin
        };
        FundingRecord {
            coin,
            funding_rate: raw.funding_rate,
            time: raw.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_funding_history() {
        let body = r#"[
            {"coin":"BTC","fundingRate":"0.0000125","premium":"-0.0003","time":1743692400053},
            {"coin":"BTC","fundingRate":"-0.0000031","premium":"0.0001","time":1743696000012}
        ]"#;
        let raw: Vec<FundingHistoryEntry> = serde_json::from_str(body).unwrap();
        let records: Vec<FundingRecord> = raw
            .into_iter()
            .map(|r| FundingRecord::from_raw("BTC", r))
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].funding_rate, 0.0000125);
        assert_eq!(records[1].time, 1_743_696_000_012);
        assert_eq!(records[1].coin(), "BTC");
    }

    #[test]
    fn test_request_ignores_end_bound() {
        assert_eq!(
            FundingRecord::request("SOL", 10, 20),
            InfoRequest::funding_history("SOL", 10)
        );
    }
}
