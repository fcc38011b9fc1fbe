use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::data::dataset::Dataset;
use crate::models::record::{DatasetKind, Record};
use crate::utils::time::{floor_to_hour, HOUR_MS};

/// Hours checked for gaps on every run, ending at the latest completed hour.
pub const WINDOW_HOURS: i64 = 24;

/// A dataset with nothing newer than this many hours is refetched in full.
pub const LOOKBACK_HOURS: i64 = 2 * WINDOW_HOURS;

// ── Reference symbol ──

/// Picks the coin whose history stands in for the whole universe.
pub trait ReferenceSymbolPolicy {
    fn symbol(&self) -> &str;

    fn is_reference(&self, coin: &str) -> bool {
        coin == self.symbol()
    }
}

/// Always inspect the same coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedReference(pub String);

impl Default for FixedReference {
    fn default() -> Self {
        FixedReference("BTC".to_string())
    }
}

impl ReferenceSymbolPolicy for FixedReference {
    fn symbol(&self) -> &str {
        &self.0
    }
}

// ── Expected hours and ranges ──

/// The hour boundaries `{H-24h, …, H}` a complete dataset has for the reference coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedHours {
    pub latest: i64,
    pub hours: Vec<i64>,
}

impl ExpectedHours {
    pub fn ending_at(latest_hour: i64) -> Self {
        let hours = (0..=WINDOW_HOURS)
            .rev()
            .map(|back| latest_hour - back * HOUR_MS)
            .collect();
        ExpectedHours {
            latest: latest_hour,
            hours,
        }
    }

    pub fn for_kind(kind: DatasetKind, now: DateTime<Utc>) -> Self {
        Self::ending_at(kind.latest_completed_hour(now))
    }

    pub fn earliest(&self) -> i64 {
        self.latest - WINDOW_HOURS * HOUR_MS
    }
}

/// Half-open time range `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl FetchRange {
    pub fn contains(&self, ms: i64) -> bool {
        self.start_ms <= ms && ms < self.end_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapReport {
    /// Sorted hour boundaries to backfill.
    pub missing_hours: Vec<i64>,
    /// Whether the latest completed hour is already stored (or will be by the backfill).
    pub latest_hour_present: bool,
}

impl GapReport {
    /// Range covering every missing hour, `[min, max + 1h)`.
    pub fn fetch_range(&self) -> Option<FetchRange> {
        let first = *self.missing_hours.first()?;
        let last = *self.missing_hours.last()?;
        Some(FetchRange {
            start_ms: first,
            end_ms: last + HOUR_MS,
        })
    }

    pub fn needs_backfill(&self) -> bool {
        !self.missing_hours.is_empty()
    }
}

// ── Detection ──

pub struct GapDetector<P> {
    policy: P,
}

impl<P: ReferenceSymbolPolicy> GapDetector<P> {
    pub fn new(policy: P) -> Self {
        GapDetector { policy }
    }

    pub fn detect<R: Record>(&self, dataset: &Dataset<R>, expected: &ExpectedHours) -> GapReport {
        let latest = expected.latest;

        let lookback = latest - LOOKBACK_HOURS * HOUR_MS;
        if !dataset.has_rows_since(lookback) {
            return GapReport {
                missing_hours: expected.hours.clone(),
                latest_hour_present: false,
            };
        }

        let earliest = expected.earliest();
        let present: BTreeSet<i64> = dataset
            .since(earliest)
            .filter(|r| self.policy.is_reference(r.coin()))
            .map(|r| floor_to_hour(r.time()))
            .filter(|&h| h >= earliest && h <= latest)
            .collect();

        let missing: Vec<i64> = expected
            .hours
            .iter()
            .copied()
            .filter(|h| !present.contains(h))
            .collect();

        match missing.as_slice() {
            [] => GapReport {
                missing_hours: missing,
                latest_hour_present: true,
            },
            [only] if *only == latest => GapReport {
                missing_hours: Vec::new(),
                latest_hour_present: false,
            },
            _ => {
                let latest_hour_present = !missing.contains(&latest);
                GapReport {
                    missing_hours: missing,
                    latest_hour_present,
                }
            }
        }
    }
}
