//! Core types and configuration for the index-signal system.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (observations, daily bars)
//! - The three-class `Signal` and the canonical `FeatureSchema`
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
