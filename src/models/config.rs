use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::record::DatasetKind;
use crate::errors::AppError;

pub const DEFAULT_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

/// Collector settings. Every field can be overridden from the environment
/// with an `HL_COLLECTOR_` prefixed variable (see [`CollectorConfig::from_env`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub info_url: String,
    /// Directory holding the dataset CSV files.
    pub data_dir: PathBuf,
    pub funding_file: String,
    pub volume_file: String,
    /// Where the ranked funding snapshot is written.
    pub snapshot_path: PathBuf,
    /// Coin whose hourly history stands in for the whole universe during gap detection.
    pub reference_coin: String,
    /// Upstream request budget; pacing between per-coin requests derives from it.
    pub requests_per_minute: u32,
    pub retry_attempts: u32,
    pub retry_initial_delay_secs: u64,
    pub http_timeout_secs: u64,
    pub funding_retention_days: u32,
    pub volume_retention_days: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            info_url: DEFAULT_INFO_URL.to_string(),
            data_dir: PathBuf::from("."),
            funding_file: "funding_data_all_coins.csv".to_string(),
            volume_file: "ohlcv_data_main.csv".to_string(),
            snapshot_path: PathBuf::from("docs/funding_data.json"),
            reference_coin: "BTC".to_string(),
            requests_per_minute: 60,
            retry_attempts: 5,
            retry_initial_delay_secs: 2,
            http_timeout_secs: 30,
            funding_retention_days: DatasetKind::Funding.default_retention_days(),
            volume_retention_days: DatasetKind::Volume.default_retention_days(),
        }
    }
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: &std::path::Path) -> PathBuf {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| default.to_path_buf())
}

impl CollectorConfig {
    /// Build the configuration from `HL_COLLECTOR_*` variables over the defaults.
    /// Unparseable numbers fall back to the default value.
    pub fn from_env() -> Result<Self, AppError> {
        let d = CollectorConfig::default();
        let config = CollectorConfig {
            info_url: env_str("HL_COLLECTOR_INFO_URL", &d.info_url),
            data_dir: env_path("HL_COLLECTOR_DATA_DIR", &d.data_dir),
            funding_file: env_str("HL_COLLECTOR_FUNDING_FILE", &d.funding_file),
            volume_file: env_str("HL_COLLECTOR_VOLUME_FILE", &d.volume_file),
            snapshot_path: env_path("HL_COLLECTOR_SNAPSHOT_PATH", &d.snapshot_path),
            reference_coin: env_str("HL_COLLECTOR_REFERENCE_COIN", &d.reference_coin),
            requests_per_minute: env_u32("HL_COLLECTOR_REQUESTS_PER_MINUTE", d.requests_per_minute),
            retry_attempts: env_u32("HL_COLLECTOR_RETRY_ATTEMPTS", d.retry_attempts),
            retry_initial_delay_secs: env_u64(
                "HL_COLLECTOR_RETRY_INITIAL_DELAY_SECS",
                d.retry_initial_delay_secs,
            ),
            http_timeout_secs: env_u64("HL_COLLECTOR_HTTP_TIMEOUT_SECS", d.http_timeout_secs),
            funding_retention_days: env_u32(
                "HL_COLLECTOR_FUNDING_RETENTION_DAYS",
                d.funding_retention_days,
            ),
            volume_retention_days: env_u32(
                "HL_COLLECTOR_VOLUME_RETENTION_DAYS",
                d.volume_retention_days,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.requests_per_minute == 0 {
            return Err(AppError::InvalidConfig(
                "requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(AppError::InvalidConfig(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.reference_coin.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "reference_coin must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dataset_path(&self, kind: DatasetKind) -> PathBuf {
        match kind {
            DatasetKind::Funding => self.data_dir.join(&self.funding_file),
            DatasetKind::Volume => self.data_dir.join(&self.volume_file),
        }
    }

    pub fn retention_days(&self, kind: DatasetKind) -> u32 {
        match kind {
            DatasetKind::Funding => self.funding_retention_days,
            DatasetKind::Volume => self.volume_retention_days,
        }
    }

    /// Sleep between consecutive per-coin requests (60 rpm ⇒ 1s).
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.requests_per_minute.max(1)))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_secs(self.retry_initial_delay_secs)
    }
}
