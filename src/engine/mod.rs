pub mod backfill;
pub mod client;
pub mod gaps;
pub mod orchestrator;
pub mod snapshot;
pub mod universe;
