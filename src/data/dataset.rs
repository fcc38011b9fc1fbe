use std::collections::BTreeMap;

use crate::models::record::{Record, RecordKey};
use crate::utils::time::DAY_MS;

/// Records of one kind, unique by `(coin, time)`.
///
/// Operations consume the dataset and hand back the new value, so a run reads
/// as `load → merge → prune → save` without shared mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<R> {
    records: BTreeMap<RecordKey, R>,
}

impl<R> Default for Dataset<R> {
    fn default() -> Self {
        Dataset {
            records: BTreeMap::new(),
        }
    }
}

impl<R: Record> Dataset<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later records replace earlier ones with the same key.
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        Self::new().merge(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in `(time, coin)` order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    /// Records with `time >= cutoff_ms`, in `(time, coin)` order.
    pub fn since(&self, cutoff_ms: i64) -> impl Iterator<Item = &R> {
        self.records
            .range(RecordKey::new(cutoff_ms, "")..)
            .map(|(_, r)| r)
    }

    pub fn get(&self, coin: &str, time: i64) -> Option<&R> {
        self.records.get(&RecordKey::new(time, coin))
    }

    pub fn latest_time(&self) -> Option<i64> {
        self.records.keys().next_back().map(|k| k.time)
    }

    pub fn has_rows_since(&self, cutoff_ms: i64) -> bool {
        self.latest_time().is_some_and(|t| t >= cutoff_ms)
    }

    /// Keyed upsert: incoming records win on collision.
    pub fn merge(mut self, incoming: impl IntoIterator<Item = R>) -> Self {
        for record in incoming {
            self.records.insert(record.key(), record);
        }
        self
    }

    /// Drop every record older than `now_ms - retention_days` days.
    pub fn prune(mut self, retention_days: u32, now_ms: i64) -> Self {
        let cutoff = now_ms - i64::from(retention_days) * DAY_MS;
        let kept = self.records.split_off(&RecordKey::new(cutoff, ""));
        self.records = kept;
        self
    }

    /// Remove every record whose time is in `timestamps`; returns the count removed.
    pub fn without_timestamps(mut self, timestamps: &[i64]) -> (Self, usize) {
        let before = self.records.len();
        if !timestamps.is_empty() {
            self.records.retain(|key, _| !timestamps.contains(&key.time));
        }
        let removed = before - self.records.len();
        (self, removed)
    }
}
