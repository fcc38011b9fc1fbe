pub mod commands;
pub mod data;
pub mod engine;
pub mod errors;
pub mod models;
pub mod utils;

#[cfg(test)]
mod testing;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. Level comes from `RUST_LOG`, default `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
