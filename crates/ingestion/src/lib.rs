//! Data ingestion and normalization for the index-signal system.
//!
//! This crate handles:
//! - Raw observation loading from multi-part CSV exports
//! - Daily bar building (OHLCV + open interest + implied volatility)
//! - Daily bar persistence

pub mod bar_builder;
pub mod source;
pub mod store;

pub use bar_builder::{aggregate_daily, DailyBarBuilder};
pub use source::{LoadReport, ObservationReader};
pub use store::{load_bars, save_bars};
