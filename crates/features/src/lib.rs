//! Feature computation for the index-signal system.
//!
//! This crate handles:
//! - Moving averages, oscillators, volatility bands and lag features
//! - The indicator engine producing named feature columns
//! - Forward-return labeling
//! - Dataset assembly and persistence

pub mod dataset;
pub mod engine;
pub mod labeler;
pub mod lags;
pub mod moving_average;
pub mod oscillators;
pub mod store;
pub mod volatility;

pub use dataset::{AssemblyStats, Dataset, DatasetAssembler, DatasetRow, DatasetSummary};
pub use engine::{FeatureFrame, IndicatorEngine};
pub use labeler::{Label, Labeler};
pub use store::{load_dataset, save_dataset};

/// Per-bar values; `None` where a window or lag does not fit or the result is not finite.
pub type Series = Vec<Option<f64>>;

/// `Some(v)` for finite values.
#[inline]
pub(crate) fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
