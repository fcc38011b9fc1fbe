pub mod candle;
pub mod config;
pub mod funding;
pub mod record;
pub mod request;
pub mod snapshot;
