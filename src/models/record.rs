use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::request::InfoRequest;
use crate::utils::time::{current_hour_ms, HOUR_MS};

/// Start of an hourly candle that the upstream served before it was complete.
/// Rows carrying it are dropped from the volume dataset on every load.
pub const INCOMPLETE_CANDLE_MS: i64 = 1_743_692_400_000;

/// The two datasets kept in sync with the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Funding,
    Volume,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Funding => "funding",
            DatasetKind::Volume => "volume",
        }
    }

    /// Hours the latest complete hour trails the current wall-clock hour.
    /// Candles are only final once the next hour has started.
    pub fn completion_lag_hours(&self) -> i64 {
        match self {
            DatasetKind::Funding => 0,
            DatasetKind::Volume => 1,
        }
    }

    /// Latest hour boundary whose data is expected to be complete at `now`.
    pub fn latest_completed_hour(&self, now: DateTime<Utc>) -> i64 {
        current_hour_ms(now) - self.completion_lag_hours() * HOUR_MS
    }

    pub fn default_retention_days(&self) -> u32 {
        match self {
            DatasetKind::Funding => 90,
            DatasetKind::Volume => 31,
        }
    }

    pub fn known_bad_timestamps(&self) -> &'static [i64] {
        match self {
            DatasetKind::Funding => &[],
            DatasetKind::Volume => &[INCOMPLETE_CANDLE_MS],
        }
    }

    /// `[start, end)` window fetched by the latest-hour fast path.
    pub fn latest_window(&self, latest_hour: i64, now_ms: i64) -> (i64, i64) {
        match self {
            // Funding entries land a few ms after the hour; two hours back always
            // contains the newest one.
            DatasetKind::Funding => (now_ms - 2 * HOUR_MS, now_ms),
            DatasetKind::Volume => (latest_hour, latest_hour + HOUR_MS),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset key. Ordered by time first so retention pruning is a range split.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub time: i64,
    pub coin: String,
}

impl RecordKey {
    pub fn new(time: i64, coin: &str) -> Self {
        RecordKey {
            time,
            coin: coin.to_string(),
        }
    }
}

/// One row of a dataset, plus how to request and decode it upstream.
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned {
    const KIND: DatasetKind;

    /// CSV header, in the order the fields serialize.
    const COLUMNS: &'static [&'static str];

    /// Entry shape returned by the info endpoint.
    type Raw: DeserializeOwned;

    fn coin(&self) -> &str;

    /// Milliseconds since epoch, UTC.
    fn time(&self) -> i64;

    fn key(&self) -> RecordKey {
        RecordKey::new(self.time(), self.coin())
    }

    /// Request covering `[start_ms, end_ms)` for one coin.
    fn request(coin: &str, start_ms: i64, end_ms: i64) -> InfoRequest;

    fn from_raw(coin: &str, raw: Self::Raw) -> Self;

    /// Short human summary of a batch, for per-coin log lines.
    fn describe(records: &[Self]) -> String {
        format!("{} entries", records.len())
    }
}
