//! Serving for the index-signal system.
//!
//! This crate provides:
//! - The immutable serving context (artifact + dataset)
//! - Typed prediction requests and responses
//! - The resolver: exact-date prediction, stats, history and date listing

pub mod context;
pub mod request;
pub mod resolver;

pub use context::ServingContext;
pub use request::{
    AvailableDates, DataRange, HealthStatus, HistoricalBar, ManualBar, PredictRequest,
    PredictionResponse, RiskLevel, ServiceStats,
};
pub use resolver::SignalResolver;
