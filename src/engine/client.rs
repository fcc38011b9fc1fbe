use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::record::Record;
use crate::models::request::InfoRequest;

/// Sends one request to the info endpoint and returns the decoded JSON body.
///
/// Implementations map HTTP 429 to [`AppError::RateLimited`] so the client
/// can tell it apart from every other failure.
pub trait InfoTransport {
    fn post_info(
        &self,
        request: &InfoRequest,
    ) -> impl Future<Output = Result<Value, AppError>> + Send;
}

// ── HTTP transport ──

pub struct HttpTransport {
    http: reqwest::Client,
    info_url: String,
}

impl HttpTransport {
    pub fn new(info_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Network(format!("Cannot build HTTP client: {}", e)))?;
        Ok(HttpTransport {
            http,
            info_url: info_url.to_string(),
        })
    }
}

impl InfoTransport for HttpTransport {
    async fn post_info(&self, request: &InfoRequest) -> Result<Value, AppError> {
        let resp = self.http.post(&self.info_url).json(request).send().await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimited);
        }
        if !status.is_success() {
            return Err(AppError::UpstreamStatus(status.as_u16()));
        }

        let body: Value = resp.json().await?;
        Ok(body)
    }
}

// ── Retry policy ──

/// Exponential backoff applied only to rate-limited responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Sleep after the rate-limited attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

}

// ── Client ──

/// Info endpoint client with bounded retry on rate limiting.
///
/// Every failure other than rate limiting gives up immediately. Callers only
/// ever see "data" or "no data"; the reason is logged here.
pub struct RateLimitedClient<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: InfoTransport> RateLimitedClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        RateLimitedClient { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn fetch(&self, request: &InfoRequest) -> Option<Value> {
        for attempt in 0..self.retry.max_attempts {
            match self.transport.post_info(request).await {
                Ok(body) => return Some(body),
                Err(e) if e.is_rate_limited() => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Rate limit exceeded for {}. Retrying in {} seconds...",
                        request.target(),
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("{} request for {} failed: {}", request.label(), request.target(), e);
                    return None;
                }
            }
        }
        warn!(
            "Failed to fetch {} for {} after {} attempts",
            request.label(),
            request.target(),
            self.retry.max_attempts
        );
        None
    }

    /// Fetch and decode a JSON body into `D`. Undecodable bodies count as no data.
    pub async fn fetch_as<D: DeserializeOwned>(&self, request: &InfoRequest) -> Option<D> {
        let body = self.fetch(request).await?;
        match serde_json::from_value(body) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(
                    "Unexpected {} response for {}: {}",
                    request.label(),
                    request.target(),
                    e
                );
                None
            }
        }
    }

    /// Records for one coin over `[start_ms, end_ms)` as requested upstream.
    /// The upstream may return entries outside the window; callers filter.
    pub async fn fetch_records<R: Record>(&self, coin: &str, start_ms: i64, end_ms: i64) -> Vec<R> {
        let request = R::request(coin, start_ms, end_ms);
        let raw: Vec<R::Raw> = match self.fetch_as(&request).await {
            Some(raw) => raw,
            None => return Vec::new(),
        };
        debug!("{} returned {} entries for {}", request.label(), raw.len(), coin);
        raw.into_iter().map(|r| R::from_raw(coin, r)).collect()
    }
}
