//! Test doubles shared by the engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{json, Value};
use tokio::time::Instant;

use crate::engine::client::InfoTransport;
use crate::errors::AppError;
use crate::models::request::InfoRequest;

type Handler = Box<dyn Fn(&InfoRequest) -> Result<Value, AppError> + Send + Sync>;

/// One request seen by [`ScriptedTransport`], with the (paused) clock reading.
#[derive(Debug, Clone)]
pub struct Call {
    pub request: InfoRequest,
    pub at: Instant,
}

/// In-memory [`InfoTransport`] that answers from a closure and records every call.
pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&InfoRequest) -> Result<Value, AppError> + Send + Sync + 'static,
    ) -> Self {
        ScriptedTransport {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer calls with `responses` in order, then fail with HTTP 500.
    pub fn sequence(responses: Vec<Result<Value, AppError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AppError::UpstreamStatus(500)))
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<InfoRequest> {
        self.calls().into_iter().map(|c| c.request).collect()
    }

    /// Requests of one type (`meta`, `fundingHistory`, `candleSnapshot`).
    pub fn requests_of(&self, label: &str) -> Vec<InfoRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.label() == label)
            .collect()
    }
}

impl InfoTransport for ScriptedTransport {
    async fn post_info(&self, request: &InfoRequest) -> Result<Value, AppError> {
        self.calls.lock().unwrap().push(Call {
            request: request.clone(),
            at: Instant::now(),
        });
        (self.handler)(request)
    }
}

// ── Fixtures ──

pub fn meta(coins: &[&str]) -> Value {
    let universe: Vec<Value> = coins
        .iter()
        .map(|c| json!({"name": c, "szDecimals": 2, "maxLeverage": 20}))
        .collect();
    json!({ "universe": universe })
}

/// `fundingHistory` body; rates are sent as decimal strings like the live API.
pub fn funding_entries(coin: &str, points: &[(i64, f64)]) -> Value {
    let entries: Vec<Value> = points
        .iter()
        .map(|(time, rate)| {
            json!({
                "coin": coin,
                "fundingRate": rate.to_string(),
                "premium": "0.0",
                "time": time,
            })
        })
        .collect();
    Value::Array(entries)
}

/// `candleSnapshot` body with flat prices at `close` and base volume `volume`.
pub fn candle_entries(coin: &str, points: &[(i64, f64, f64)]) -> Value {
    let entries: Vec<Value> = points
        .iter()
        .map(|(t, close, volume)| {
            json!({
                "t": t,
                "T": t + 3_599_999,
                "s": coin,
                "i": "1h",
                "o": close.to_string(),
                "c": close.to_string(),
                "h": close.to_string(),
                "l": close.to_string(),
                "v": volume.to_string(),
                "n": 10,
            })
        })
        .collect();
    Value::Array(entries)
}
