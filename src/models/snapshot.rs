use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Hourly rate → annualized percentage.
pub const ANNUALIZATION_FACTOR: f64 = 24.0 * 365.0 * 100.0;

/// Averaging windows published in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AveragePeriod {
    OneDay,
    ThreeDays,
    FiveDays,
}

impl AveragePeriod {
    pub const ALL: [AveragePeriod; 3] = [
        AveragePeriod::OneDay,
        AveragePeriod::ThreeDays,
        AveragePeriod::FiveDays,
    ];

    pub fn days(&self) -> i64 {
        match self {
            AveragePeriod::OneDay => 1,
            AveragePeriod::ThreeDays => 3,
            AveragePeriod::FiveDays => 5,
        }
    }

    /// Hourly points a coin needs inside the window to get an average.
    pub fn required_points(&self) -> usize {
        (self.days() * 24) as usize
    }

    pub fn value_field(&self) -> &'static str {
        match self {
            AveragePeriod::OneDay => "fundingRate_avg_1d",
            AveragePeriod::ThreeDays => "fundingRate_avg_3d",
            AveragePeriod::FiveDays => "fundingRate_avg_5d",
        }
    }

    fn bucket_keys(&self) -> (&'static str, &'static str) {
        match self {
            AveragePeriod::OneDay => ("positive_1d", "negative_1d"),
            AveragePeriod::ThreeDays => ("positive_3d", "negative_3d"),
            AveragePeriod::FiveDays => ("positive_5d", "negative_5d"),
        }
    }
}

/// A coin's annualized rate inside a ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCoin {
    pub coin: String,
    pub value: f64,
    pub is_new: bool,
}

/// Positive rates sorted descending, negative rates sorted ascending.
/// Exactly-zero rates appear in neither side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub positive: Vec<RankedCoin>,
    pub negative: Vec<RankedCoin>,
}

impl Ranking {
    pub fn from_coins(coins: impl IntoIterator<Item = RankedCoin>) -> Self {
        let (mut positive, mut negative): (Vec<_>, Vec<_>) = coins
            .into_iter()
            .filter(|c| c.value != 0.0 && !c.value.is_nan())
            .partition(|c| c.value > 0.0);
        positive.sort_by(|a, b| b.value.total_cmp(&a.value));
        negative.sort_by(|a, b| a.value.total_cmp(&b.value));
        Ranking { positive, negative }
    }
}

/// Average daily USD volume per coin, keyed by window length in days.
/// `None` marks a coin without full hourly coverage for the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvTable {
    pub windows: BTreeMap<u32, BTreeMap<String, Option<f64>>>,
}

/// Everything the website consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingSnapshot {
    /// Latest funding hour in the dataset.
    pub timestamp: String,
    pub generated_at: String,
    pub current: Ranking,
    pub averages: Vec<(AveragePeriod, Ranking)>,
    pub adv: AdvTable,
}

impl FundingSnapshot {
    pub fn average(&self, period: AveragePeriod) -> Option<&Ranking> {
        self.averages
            .iter()
            .find(|(p, _)| *p == period)
            .map(|(_, ranking)| ranking)
    }
}

// ── Serialization ──

struct Entries<'a> {
    value_field: &'static str,
    coins: &'a [RankedCoin],
}

struct Entry<'a> {
    value_field: &'static str,
    coin: &'a RankedCoin,
}

impl Serialize for Entry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("coin", &self.coin.coin)?;
        map.serialize_entry(self.value_field, &self.coin.value)?;
        map.serialize_entry("isNew", &self.coin.is_new)?;
        map.end()
    }
}

impl Serialize for Entries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.coins.len()))?;
        for coin in self.coins {
            seq.serialize_element(&Entry {
                value_field: self.value_field,
                coin,
            })?;
        }
        seq.end()
    }
}

impl Serialize for AdvTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.windows.len()))?;
        for (days, by_coin) in &self.windows {
            map.serialize_entry(&format!("{}d", days), by_coin)?;
        }
        map.end()
    }
}

impl Serialize for FundingSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        const CURRENT_FIELD: &str = "fundingRate_annualized";

        let mut map = serializer.serialize_map(Some(5 + 2 * self.averages.len()))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("generated_at", &self.generated_at)?;
        map.serialize_entry(
            "positive_current",
            &Entries {
                value_field: CURRENT_FIELD,
                coins: &self.current.positive,
            },
        )?;
        map.serialize_entry(
            "negative_current",
            &Entries {
                value_field: CURRENT_FIELD,
                coins: &self.current.negative,
            },
        )?;
        map.serialize_entry("adv_data", &self.adv)?;
        for (period, ranking) in &self.averages {
            let (positive_key, negative_key) = period.bucket_keys();
            map.serialize_entry(
                positive_key,
                &Entries {
                    value_field: period.value_field(),
                    coins: &ranking.positive,
                },
            )?;
            map.serialize_entry(
                negative_key,
                &Entries {
                    value_field: period.value_field(),
                    coins: &ranking.negative,
                },
            )?;
        }
        map.end()
    }
}
