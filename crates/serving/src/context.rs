//! Immutable serving state, built once at startup.

use signal_core::{Config, Error, Result};
use signal_features::{load_dataset, Dataset, DatasetRow};
use signal_model::ModelArtifact;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything a request may read: the artifact, the dataset and presentation settings.
///
/// Built once and shared behind `Arc`; no request mutates it.
#[derive(Debug)]
pub struct ServingContext {
    artifact: ModelArtifact,
    dataset: Dataset,
    /// Dead zone the artifact's labels were built with.
    threshold_pct: f64,
    instrument: String,
    sample_dates: usize,
}

impl ServingContext {
    /// Bind an artifact to a dataset.
    ///
    /// Fails with `ArtifactMismatch` unless the dataset columns are exactly the
    /// artifact columns in the same order.
    pub fn new(artifact: ModelArtifact, dataset: Dataset, config: &Config) -> Result<Self> {
        artifact.verify_schema(dataset.schema())?;

        let threshold_pct = artifact.info().label_threshold_pct;
        if threshold_pct != config.labeling.threshold_pct {
            warn!(
                artifact = threshold_pct,
                configured = config.labeling.threshold_pct,
                "label threshold differs from configuration; using the artifact's"
            );
        }

        info!(
            model = %artifact.version().id,
            rows = dataset.len(),
            features = dataset.schema().len(),
            threshold_pct,
            "serving context ready"
        );

        Ok(Self {
            artifact,
            dataset,
            threshold_pct,
            instrument: config.serving.instrument.clone(),
            sample_dates: config.serving.sample_dates,
        })
    }

    /// Load the artifact and dataset named in the serving configuration.
    ///
    /// A missing or unreadable artifact is `ModelNotLoaded`.
    pub fn load(config: &Config) -> Result<Arc<Self>> {
        let path = &config.serving.artifact_path;
        let artifact = ModelArtifact::load(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "model artifact unavailable");
            Error::model_not_loaded(format!("{}: {e}", path.display()))
        })?;
        let dataset = load_dataset(&config.serving.dataset_path)?;
        Ok(Arc::new(Self::new(artifact, dataset, config)?))
    }

    /// Loaded artifact.
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Persisted dataset.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Features of a stored row in artifact column order. The schemas were
    /// checked equal at construction, so this is the row as stored.
    pub(crate) fn features_for<'a>(&self, row: &'a DatasetRow) -> &'a [f64] {
        &row.features
    }

    /// Dead-zone threshold in percent, as recorded in the artifact.
    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    /// Instrument name for recommendation text.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Number of trailing dates listed by `available_dates`.
    pub fn sample_dates(&self) -> usize {
        self.sample_dates
    }
}
