/// All application errors, categorized by domain.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Storage ──
    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Failed to write file: {0}")]
    FileWrite(String),

    #[error("CSV error: {0}")]
    Csv(String),

    // ── Upstream ──
    #[error("Rate limited by upstream API")]
    RateLimited,

    #[error("Upstream API returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    // ── Snapshot ──
    #[error("No data available: {0}")]
    NoData(String),

    // ── Configuration ──
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown selector: {0}")]
    UnknownSelector(String),

    // ── Serialization ──
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Whether the failure is upstream rate limiting, the only retryable kind.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited)
    }
}

// ── Conversions from external errors ──

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Csv(err.to_string())
    }
}

impl From<tempfile::PersistError> for AppError {
    fn from(err: tempfile::PersistError) -> Self {
        AppError::FileWrite(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Decode(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}
