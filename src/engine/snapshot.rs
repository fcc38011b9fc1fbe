use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use tracing::info;

use crate::data::dataset::Dataset;
use crate::data::storage::DatasetStore;
use crate::errors::AppError;
use crate::models::candle::VolumeRecord;
use crate::models::config::CollectorConfig;
use crate::models::funding::FundingRecord;
use crate::models::snapshot::{
    AdvTable, AveragePeriod, FundingSnapshot, RankedCoin, Ranking, ANNUALIZATION_FACTOR,
};
use crate::utils::export::write_json_atomic;
use crate::utils::time::{floor_to_hour, format_ms, format_utc, DAY_MS};

/// A coin is flagged new when its first funding record is this recent.
pub const NEW_LISTING_DAYS: i64 = 7;

/// ADV windows published, in days.
pub const ADV_MAX_DAYS: u32 = 30;

/// Build the ranked funding snapshot from the stored datasets.
pub fn build_snapshot(
    funding: &Dataset<FundingRecord>,
    volume: &Dataset<VolumeRecord>,
    generated_at: DateTime<Utc>,
) -> Result<FundingSnapshot, AppError> {
    let latest = funding
        .latest_time()
        .ok_or_else(|| AppError::NoData("funding dataset is empty".to_string()))?;
    let latest_hour = floor_to_hour(latest);

    let current: Vec<&FundingRecord> = funding
        .since(latest_hour)
        .filter(|r| floor_to_hour(r.time) == latest_hour)
        .collect();

    let first_seen = first_seen_by_coin(funding);
    let new_cutoff = latest - NEW_LISTING_DAYS * DAY_MS;
    let is_new = |coin: &str| first_seen.get(coin).is_some_and(|&t| t >= new_cutoff);

    let current_ranking = Ranking::from_coins(current.iter().map(|r| RankedCoin {
        coin: r.coin.clone(),
        value: r.funding_rate * ANNUALIZATION_FACTOR,
        is_new: is_new(r.coin.as_str()),
    }));

    let averages = AveragePeriod::ALL
        .iter()
        .map(|&period| {
            let rates = rates_since(funding, latest - period.days() * DAY_MS);
            let coins = current.iter().filter_map(|r| {
                let coin_rates = rates.get(r.coin.as_str())?;
                if coin_rates.len() < period.required_points() {
                    return None;
                }
                Some(RankedCoin {
                    coin: r.coin.clone(),
                    value: coin_rates.iter().mean() * ANNUALIZATION_FACTOR,
                    is_new: is_new(r.coin.as_str()),
                })
            });
            (period, Ranking::from_coins(coins))
        })
        .collect();

    Ok(FundingSnapshot {
        timestamp: format_ms(latest),
        generated_at: format_utc(&generated_at),
        current: current_ranking,
        averages,
        adv: adv_table(volume),
    })
}

fn first_seen_by_coin(funding: &Dataset<FundingRecord>) -> HashMap<&str, i64> {
    let mut first_seen: HashMap<&str, i64> = HashMap::new();
    // Iteration is time-ordered, so the first hit per coin is the earliest.
    for r in funding.iter() {
        first_seen.entry(r.coin.as_str()).or_insert(r.time);
    }
    first_seen
}

/// Funding rates per coin with `time >= cutoff`.
fn rates_since(funding: &Dataset<FundingRecord>, cutoff: i64) -> HashMap<&str, Vec<f64>> {
    let mut rates: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in funding.since(cutoff) {
        rates.entry(r.coin.as_str()).or_default().push(r.funding_rate);
    }
    rates
}

/// Average daily USD volume for every coin and every window of 1..=30 days.
///
/// Windows are `time > latest - days`; a coin needs one record per hour of
/// the window, otherwise its entry is `None`.
pub fn adv_table(volume: &Dataset<VolumeRecord>) -> AdvTable {
    let mut table = AdvTable::default();
    let latest = match volume.latest_time() {
        Some(t) => t,
        None => return table,
    };

    let mut coins: Vec<&str> = volume.iter().map(|r| r.coin.as_str()).collect();
    coins.sort_unstable();
    coins.dedup();

    for days in 1..=ADV_MAX_DAYS {
        let cutoff = latest - i64::from(days) * DAY_MS;
        let mut sums: HashMap<&str, (usize, f64)> = HashMap::new();
        for r in volume.since(cutoff + 1) {
            let entry = sums.entry(r.coin.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += r.volume_usd;
        }

        let required = days as usize * 24;
        let by_coin: BTreeMap<String, Option<f64>> = coins
            .iter()
            .map(|&coin| {
                let adv = sums
                    .get(coin)
                    .filter(|(count, _)| *count >= required)
                    .map(|(_, total)| total / f64::from(days));
                (coin.to_string(), adv)
            })
            .collect();
        table.windows.insert(days, by_coin);
    }
    table
}

/// Load both datasets, build the snapshot and write it to the configured path.
pub fn generate_snapshot(
    config: &CollectorConfig,
    store: &DatasetStore,
    now: DateTime<Utc>,
) -> Result<FundingSnapshot, AppError> {
    let funding: Dataset<FundingRecord> = store.load()?;
    let volume: Dataset<VolumeRecord> = store.load()?;

    let snapshot = build_snapshot(&funding, &volume, now)?;
    write_snapshot(&snapshot, &config.snapshot_path)?;
    Ok(snapshot)
}

fn write_snapshot(snapshot: &FundingSnapshot, path: &Path) -> Result<(), AppError> {
    write_json_atomic(snapshot, path)?;
    info!(
        "Snapshot for {} written to {} ({} positive, {} negative current rates)",
        snapshot.timestamp,
        path.display(),
        snapshot.current.positive.len(),
        snapshot.current.negative.len()
    );
    Ok(())
}
