use serde::Serialize;

/// Candle interval requested from `candleSnapshot`.
pub const HOURLY_INTERVAL: &str = "1h";

/// Body of a `POST /info` request; `type` selects the endpoint behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    /// Perpetuals metadata, including the tradable universe.
    Meta,
    #[serde(rename_all = "camelCase")]
    FundingHistory { coin: String, start_time: i64 },
    CandleSnapshot { req: CandleRequest },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleRequest {
    pub coin: String,
    pub interval: String,
    pub start_time: i64,
    pub end_time: i64,
}

impl InfoRequest {
    pub fn funding_history(coin: &str, start_time: i64) -> Self {
        InfoRequest::FundingHistory {
            coin: coin.to_string(),
            start_time,
        }
    }

    pub fn hourly_candles(coin: &str, start_time: i64, end_time: i64) -> Self {
        InfoRequest::CandleSnapshot {
            req: CandleRequest {
                coin: coin.to_string(),
                interval: HOURLY_INTERVAL.to_string(),
                start_time,
                end_time,
            },
        }
    }

    /// Value of the `type` field.
    pub fn label(&self) -> &'static str {
        match self {
            InfoRequest::Meta => "meta",
            InfoRequest::FundingHistory { .. } => "fundingHistory",
            InfoRequest::CandleSnapshot { .. } => "candleSnapshot",
        }
    }

    /// Coin the request is about, or the request type for universe-wide requests.
    pub fn target(&self) -> &str {
        match self {
            InfoRequest::Meta => "meta",
            InfoRequest::FundingHistory { coin, .. } => coin,
            InfoRequest::CandleSnapshot { req } => &req.coin,
        }
    }
}
