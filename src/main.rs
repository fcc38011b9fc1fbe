use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info};

use market_collector_lib::commands::{self, Selector, USAGE};
use market_collector_lib::models::config::CollectorConfig;
use market_collector_lib::utils::time::format_utc;

#[tokio::main]
async fn main() -> ExitCode {
    let selector = match Selector::from_args(std::env::args().skip(1)) {
        Ok(selector) => selector,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    market_collector_lib::init_tracing();

    match run(selector).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(selector: Selector) -> anyhow::Result<()> {
    let config = CollectorConfig::from_env().context("Invalid collector configuration")?;

    let started = Utc::now();
    info!("Market data collection started at {}", format_utc(&started));

    commands::execute(selector, &config)
        .await
        .with_context(|| format!("{} run failed", selector))?;

    let finished = Utc::now();
    info!(
        "Market data collection finished at {} ({}s)",
        format_utc(&finished),
        (finished - started).num_seconds()
    );
    Ok(())
}
