//! wattwise core: incremental sync of electricity consumption and Tempo
//! colors, tariff rate ingestion, and multi-plan cost computation over a
//! SQLite ledger.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod meter;
pub mod plan;
pub mod pricing;
pub mod providers;
pub mod rates;
pub mod store;
pub mod sync;
pub mod types;
