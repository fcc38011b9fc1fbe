use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::backfill::BackfillEngine;
use super::client::{InfoTransport, RateLimitedClient};
use super::gaps::{ExpectedHours, GapDetector, ReferenceSymbolPolicy};
use super::universe::resolve_universe;
use crate::data::dataset::Dataset;
use crate::data::storage::DatasetStore;
use crate::errors::AppError;
use crate::models::config::CollectorConfig;
use crate::models::record::{DatasetKind, Record};
use crate::utils::time::{format_hours, format_ms, format_utc};

/// Which fetches a run performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPath {
    /// Universe unavailable; the stored dataset was only pruned and rewritten.
    Idle,
    UpToDate,
    LatestHourOnly,
    Backfill,
    BackfillThenLatest,
}

impl fmt::Display for RunPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPath::Idle => "idle",
            RunPath::UpToDate => "up to date",
            RunPath::LatestHourOnly => "latest hour only",
            RunPath::Backfill => "backfill",
            RunPath::BackfillThenLatest => "backfill + latest hour",
        };
        f.write_str(s)
    }
}

/// Counts from one collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub kind: DatasetKind,
    pub path: RunPath,
    pub universe: usize,
    pub loaded: usize,
    pub backfilled: usize,
    pub latest: usize,
    /// Records that did not exist before the run.
    pub added: usize,
    pub pruned: usize,
    pub saved: usize,
}

/// Runs one dataset kind through load → detect → fetch → merge → prune → save.
pub struct Orchestrator<'a, T, P> {
    client: &'a RateLimitedClient<T>,
    store: &'a DatasetStore,
    detector: &'a GapDetector<P>,
    config: &'a CollectorConfig,
}

impl<'a, T: InfoTransport, P: ReferenceSymbolPolicy> Orchestrator<'a, T, P> {
    pub fn new(
        client: &'a RateLimitedClient<T>,
        store: &'a DatasetStore,
        detector: &'a GapDetector<P>,
        config: &'a CollectorConfig,
    ) -> Self {
        Orchestrator {
            client,
            store,
            detector,
            config,
        }
    }

    pub async fn collect<R: Record>(&self, now: DateTime<Utc>) -> Result<RunSummary, AppError> {
        let kind = R::KIND;
        let now_ms = now.timestamp_millis();
        info!("Starting {} collection at {}", kind, format_utc(&now));

        let coins = resolve_universe(self.client).await;
        let dataset: Dataset<R> = self.store.load()?;
        let loaded = dataset.len();

        let mut summary = RunSummary {
            kind,
            path: RunPath::Idle,
            universe: coins.len(),
            loaded,
            backfilled: 0,
            latest: 0,
            added: 0,
            pruned: 0,
            saved: 0,
        };

        if coins.is_empty() {
            warn!("No coins found. Keeping existing {} data.", kind);
            return self.finish(dataset, summary, now_ms);
        }

        let expected = ExpectedHours::for_kind(kind, now);
        let latest_hour = expected.latest;
        let report = self.detector.detect(&dataset, &expected);
        let engine = BackfillEngine::new(self.client, self.config.request_interval());

        let mut dataset = dataset;
        let range = report.fetch_range();
        summary.path = RunPath::UpToDate;

        if let Some(range) = range {
            info!(
                "Missing {} hours ({}): {}",
                kind,
                report.missing_hours.len(),
                format_hours(&report.missing_hours)
            );
            let fetched: Vec<R> = engine.backfill(&coins, range).await;
            summary.backfilled = fetched.len();
            dataset = dataset.merge(fetched);
            summary.path = RunPath::Backfill;
        }

        let latest_covered = range.is_some_and(|r| r.contains(latest_hour));
        if !report.latest_hour_present && !latest_covered {
            info!(
                "Only the latest {} hour is missing ({})",
                kind,
                format_ms(latest_hour)
            );
            let fetched: Vec<R> = engine.fetch_latest(&coins, latest_hour, now_ms).await;
            summary.latest = fetched.len();
            dataset = dataset.merge(fetched);
            summary.path = if range.is_some() {
                RunPath::BackfillThenLatest
            } else {
                RunPath::LatestHourOnly
            };
        } else if range.is_none() {
            info!(
                "All {} data up to {} is present. Nothing to fetch.",
                kind,
                format_ms(latest_hour)
            );
        }

        summary.added = dataset.len().saturating_sub(loaded);
        self.finish(dataset, summary, now_ms)
    }

    fn finish<R: Record>(
        &self,
        dataset: Dataset<R>,
        mut summary: RunSummary,
        now_ms: i64,
    ) -> Result<RunSummary, AppError> {
        let retention = self.config.retention_days(R::KIND);
        let before = dataset.len();
        let dataset = dataset.prune(retention, now_ms);
        summary.pruned = before - dataset.len();
        if summary.pruned > 0 {
            info!(
                "Removed {} {} records older than {} days",
                summary.pruned,
                R::KIND,
                retention
            );
        }

        summary.saved = self.store.save(&dataset)?;
        info!(
            "{} run finished ({}): {} loaded, {} added, {} pruned, {} saved",
            R::KIND,
            summary.path,
            summary.loaded,
            summary.added,
            summary.pruned,
            summary.saved
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::client::RetryPolicy;
    use crate::engine::gaps::FixedReference;
    use crate::models::candle::VolumeRecord;
    use crate::models::funding::FundingRecord;
    use crate::models::request::InfoRequest;
    use crate::testing::{candle_entries, funding_entries, meta, ScriptedTransport};
    use crate::utils::time::{floor_to_hour, DAY_MS, HOUR_MS};
    use chrono::TimeZone;

    /// Offset of funding entries past the hour, as seen upstream.
    const JITTER: i64 = 53;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 20, 0).unwrap()
    }

    fn funding_hour() -> i64 {
        DatasetKind::Funding.latest_completed_hour(now())
    }

    /// Upstream with complete hourly history for every coin up to `now`.
    fn market(coins: &'static [&'static str], now_ms: i64) -> ScriptedTransport {
        ScriptedTransport::new(move |req| match req {
            InfoRequest::Meta => Ok(meta(coins)),
            InfoRequest::FundingHistory { coin, start_time } => {
                let mut points = Vec::new();
                let mut h = floor_to_hour(*start_time);
                while h + JITTER < now_ms {
                    if h + JITTER >= *start_time {
                        points.push((h + JITTER, 0.0001));
                    }
                    h += HOUR_MS;
                }
                Ok(funding_entries(coin, &points))
            }
            InfoRequest::CandleSnapshot { req } => {
                let mut points = Vec::new();
                let mut h = req.start_time;
                // Includes the still-open candle of the current hour.
                while h <= req.end_time && h <= floor_to_hour(now_ms) {
                    points.push((h, 2.0, 5.0));
                    h += HOUR_MS;
                }
                Ok(candle_entries(&req.coin, &points))
            }
        })
    }

    fn funding(coin: &str, time: i64) -> FundingRecord {
        FundingRecord {
            coin: coin.to_string(),
            funding_rate: 0.0001,
            time,
        }
    }

    fn seeded_funding(hours: impl Iterator<Item = i64>) -> Dataset<FundingRecord> {
        Dataset::from_records(hours.flat_map(|h| {
            vec![funding("BTC", h + JITTER), funding("ETH", h + JITTER)]
        }))
    }

    struct Harness {
        _dir: tempfile::TempDir,
        store: DatasetStore,
        config: CollectorConfig,
        detector: GapDetector<FixedReference>,
        client: RateLimitedClient<ScriptedTransport>,
    }

    impl Harness {
        fn new(transport: ScriptedTransport) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = CollectorConfig {
                data_dir: dir.path().to_path_buf(),
                ..Default::default()
            };
            Harness {
                store: DatasetStore::from_config(&config),
                detector: GapDetector::new(FixedReference::default()),
                client: RateLimitedClient::new(transport, RetryPolicy::default()),
                config,
                _dir: dir,
            }
        }

        async fn run<R: Record>(&self) -> RunSummary {
            Orchestrator::new(&self.client, &self.store, &self.detector, &self.config)
                .collect::<R>(now())
                .await
                .unwrap()
        }

        fn transport(&self) -> &ScriptedTransport {
            self.client.transport()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_dataset_backfills_full_window() {
        let h = Harness::new(market(&["BTC", "ETH"], now().timestamp_millis()));
        let summary = h.run::<FundingRecord>().await;

        assert_eq!(summary.path, RunPath::Backfill);
        assert_eq!(summary.added, 50);
        assert_eq!(summary.latest, 0);

        let requests = h.transport().requests_of("fundingHistory");
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0],
            InfoRequest::funding_history("BTC", funding_hour() - 24 * HOUR_MS)
        );

        let stored: Dataset<FundingRecord> = h.store.load().unwrap();
        assert_eq!(stored.len(), 50);
        assert!(stored.get("ETH", funding_hour() + JITTER).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_hour_missing_fetches_one_hour_per_coin() {
        let h = Harness::new(market(&["BTC", "ETH"], now().timestamp_millis()));
        let latest = funding_hour();
        h.store
            .save(&seeded_funding((1..=24).map(|back| latest - back * HOUR_MS)))
            .unwrap();

        let summary = h.run::<FundingRecord>().await;

        assert_eq!(summary.path, RunPath::LatestHourOnly);
        assert_eq!(summary.backfilled, 0);
        assert_eq!(summary.latest, 2);
        assert_eq!(summary.added, 2);
        assert_eq!(h.transport().requests_of("fundingHistory").len(), 2);

        let stored: Dataset<FundingRecord> = h.store.load().unwrap();
        assert!(stored.get("BTC", latest + JITTER).is_some());
        assert!(stored.get("ETH", latest + JITTER).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interior_gap_fetches_only_that_hour() {
        let h = Harness::new(market(&["BTC", "ETH"], now().timestamp_millis()));
        let latest = funding_hour();
        let gap = latest - 9 * HOUR_MS;
        h.store
            .save(&seeded_funding(
                (0..=24)
                    .map(|back| latest - back * HOUR_MS)
                    .filter(|&t| t != gap),
            ))
            .unwrap();

        let summary = h.run::<FundingRecord>().await;

        assert_eq!(summary.path, RunPath::Backfill);
        assert_eq!(summary.backfilled, 2);
        assert_eq!(summary.added, 2);
        assert_eq!(
            h.transport().requests_of("fundingHistory"),
            vec![
                InfoRequest::funding_history("BTC", gap),
                InfoRequest::funding_history("ETH", gap),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_dataset_fetches_nothing() {
        let h = Harness::new(market(&["BTC", "ETH"], now().timestamp_millis()));
        let latest = funding_hour();
        h.store
            .save(&seeded_funding((0..=24).map(|back| latest - back * HOUR_MS)))
            .unwrap();

        let summary = h.run::<FundingRecord>().await;

        assert_eq!(summary.path, RunPath::UpToDate);
        assert_eq!(summary.added, 0);
        assert_eq!(summary.saved, 50);
        assert_eq!(h.transport().requests(), vec![InfoRequest::Meta]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_is_idempotent() {
        let h = Harness::new(market(&["BTC", "ETH", "SOL"], now().timestamp_millis()));
        let first = h.run::<FundingRecord>().await;
        let second = h.run::<FundingRecord>().await;

        assert_eq!(second.path, RunPath::UpToDate);
        assert_eq!(second.added, 0);
        assert_eq!(second.saved, first.saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_universe_only_prunes() {
        let transport = ScriptedTransport::new(|_| Err(AppError::UpstreamStatus(503)));
        let h = Harness::new(transport);
        let now_ms = now().timestamp_millis();
        h.store
            .save(&Dataset::from_records(vec![
                funding("BTC", now_ms - 91 * DAY_MS),
                funding("BTC", now_ms - 2 * HOUR_MS),
            ]))
            .unwrap();

        let summary = h.run::<FundingRecord>().await;

        assert_eq!(summary.path, RunPath::Idle);
        assert_eq!(summary.universe, 0);
        assert_eq!(summary.pruned, 1);
        assert_eq!(summary.saved, 1);
        assert_eq!(h.transport().requests(), vec![InfoRequest::Meta]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_backfill_skips_open_candle() {
        let h = Harness::new(market(&["BTC"], now().timestamp_millis()));
        let summary = h.run::<VolumeRecord>().await;

        let latest = DatasetKind::Volume.latest_completed_hour(now());
        assert_eq!(summary.path, RunPath::Backfill);
        assert_eq!(summary.added, 25);

        let stored: Dataset<VolumeRecord> = h.store.load().unwrap();
        assert_eq!(stored.latest_time(), Some(latest));
        assert!(stored.get("BTC", latest + HOUR_MS).is_none());
        assert_eq!(stored.get("BTC", latest).unwrap().volume_usd, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_retention_is_shorter() {
        let h = Harness::new(market(&["BTC"], now().timestamp_millis()));
        let latest = DatasetKind::Volume.latest_completed_hour(now());
        let old = VolumeRecord {
            coin: "BTC".into(),
            open_price: 1.0,
            high_price: 1.0,
            low_price: 1.0,
            close_price: 1.0,
            volume_usd: 1.0,
            trade_count: 1,
            time: latest - 40 * DAY_MS,
        };
        h.store.save(&Dataset::from_records(vec![old])).unwrap();

        let summary = h.run::<VolumeRecord>().await;
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.pruned, 1);
        assert_eq!(summary.saved, 25);
    }
}
