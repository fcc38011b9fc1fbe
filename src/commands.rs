use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use tracing::{error, info};

use crate::data::storage::DatasetStore;
use crate::engine::client::{HttpTransport, InfoTransport, RateLimitedClient, RetryPolicy};
use crate::engine::gaps::{FixedReference, GapDetector, ReferenceSymbolPolicy};
use crate::engine::orchestrator::{Orchestrator, RunSummary};
use crate::engine::snapshot::generate_snapshot;
use crate::errors::AppError;
use crate::models::candle::VolumeRecord;
use crate::models::config::CollectorConfig;
use crate::models::funding::FundingRecord;

pub const USAGE: &str = "\
Usage: market-collector [funding|volume|snapshot]

  (no argument)  collect funding, then volume
  funding        collect hourly funding rates
  volume         collect hourly OHLCV and USD volume
  snapshot       write the ranked funding snapshot from stored data

Configuration is read from HL_COLLECTOR_* environment variables.
Log level follows RUST_LOG (default: info).";

/// What a single invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    Funding,
    Volume,
    Snapshot,
}

impl Selector {
    /// Parse the arguments after the program name. No argument selects both datasets.
    pub fn from_args<I, S>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        match args.as_slice() {
            [] => Ok(Selector::All),
            [one] => one.parse(),
            _ => Err(AppError::UnknownSelector(args.join(" "))),
        }
    }

    fn collects_funding(&self) -> bool {
        matches!(self, Selector::All | Selector::Funding)
    }

    fn collects_volume(&self) -> bool {
        matches!(self, Selector::All | Selector::Volume)
    }
}

impl FromStr for Selector {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "funding" => Ok(Selector::Funding),
            "volume" => Ok(Selector::Volume),
            "snapshot" => Ok(Selector::Snapshot),
            _ => Err(AppError::UnknownSelector(s.to_string())),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Selector::All => "funding+volume",
            Selector::Funding => "funding",
            Selector::Volume => "volume",
            Selector::Snapshot => "snapshot",
        };
        f.write_str(s)
    }
}

// ── Entry point ──

/// Run one invocation against the live API.
pub async fn execute(selector: Selector, config: &CollectorConfig) -> Result<(), AppError> {
    info!("Running {}", selector);
    let store = DatasetStore::from_config(config);

    if selector == Selector::Snapshot {
        generate_snapshot(config, &store, Utc::now())?;
        return Ok(());
    }

    let transport = HttpTransport::new(&config.info_url, config.http_timeout())?;
    let retry = RetryPolicy {
        max_attempts: config.retry_attempts,
        initial_delay: config.retry_initial_delay(),
    };
    let client = RateLimitedClient::new(transport, retry);
    let detector = GapDetector::new(FixedReference(config.reference_coin.clone()));
    let orchestrator = Orchestrator::new(&client, &store, &detector, config);

    run_collection(&orchestrator, selector).await?;
    Ok(())
}

/// Run the selected pipelines in order. A storage failure in one pipeline
/// ends the run before the next pipeline starts.
pub async fn run_collection<T, P>(
    orchestrator: &Orchestrator<'_, T, P>,
    selector: Selector,
) -> Result<Vec<RunSummary>, AppError>
where
    T: InfoTransport,
    P: ReferenceSymbolPolicy,
{
    let mut summaries = Vec::new();

    if selector.collects_funding() {
        let summary = orchestrator
            .collect::<FundingRecord>(Utc::now())
            .await
            .inspect_err(|e| error!("Funding collection failed: {}", e))?;
        summaries.push(summary);
    }

    if selector.collects_volume() {
        let summary = orchestrator
            .collect::<VolumeRecord>(Utc::now())
            .await
            .inspect_err(|e| error!("Volume collection failed: {}", e))?;
        summaries.push(summary);
    }

    Ok(summaries)
}
