//! Model artifact: classifier, scaler and feature columns saved as one unit.
//!
//! The column list stored here is the only order in which a feature vector
//! may be handed to the scaler and classifier.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use signal_core::{Error, FeatureSchema, Result, Signal};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::classifier::{Classifier, FittedClassifier, Probabilities};
use crate::scaler::StandardScaler;

/// Identity of a trained artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Human-readable identifier.
    pub id: String,
    /// Training time.
    pub trained_at: DateTime<Utc>,
    /// blake3 fingerprint of the feature columns.
    pub schema_fingerprint: String,
}

/// Training summary stored with the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Classifier name.
    pub model_type: String,
    /// Feature count.
    pub n_features: usize,
    /// Rows in the dataset.
    pub n_samples: usize,
    /// Rows used for fitting.
    pub train_rows: usize,
    /// Rows held out.
    pub test_rows: usize,
    /// Accuracy on the training rows (0-1).
    pub train_accuracy: f64,
    /// Accuracy on the held-out rows (0-1); `None` without a test set.
    pub test_accuracy: Option<f64>,
    /// Dead-zone threshold the labels were built with, in percent.
    pub label_threshold_pct: f64,
    /// Label counts over the whole dataset.
    pub class_distribution: BTreeMap<Signal, usize>,
    /// First dataset date.
    pub data_start: Option<NaiveDate>,
    /// Last dataset date.
    pub data_end: Option<NaiveDate>,
    /// Features by descending importance; empty when the model has none.
    #[serde(default)]
    pub feature_importances: Vec<FeatureImportance>,
}

/// Importance of one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Column name.
    pub feature: String,
    /// Share of the total importance (0-1).
    pub importance: f64,
}

impl FeatureImportance {
    /// Pair columns with importances and sort descending; ties keep column order.
    pub fn ranking(columns: &[String], importances: &[f64]) -> Vec<Self> {
        let mut ranking: Vec<Self> = columns
            .iter()
            .zip(importances)
            .map(|(feature, &importance)| Self {
                feature: feature.clone(),
                importance,
            })
            .collect();
        ranking.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranking
    }
}

/// Everything needed to score a feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    version: ModelVersion,
    feature_columns: Vec<String>,
    scaler: StandardScaler,
    classifier: FittedClassifier,
    info: ModelInfo,
}

impl ModelArtifact {
    /// Bundle fitted parts; fails if their dimensions disagree.
    pub fn new(
        schema: &FeatureSchema,
        scaler: StandardScaler,
        classifier: impl Into<FittedClassifier>,
        info: ModelInfo,
        trained_at: DateTime<Utc>,
    ) -> Result<Self> {
        let classifier = classifier.into();
        let version = ModelVersion {
            id: format!("{}-{}", classifier.name(), trained_at.format("%Y%m%d%H%M%S")),
            trained_at,
            schema_fingerprint: schema.fingerprint(),
        };
        let artifact = Self {
            version,
            feature_columns: schema.columns().to_vec(),
            scaler,
            classifier,
            info,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Artifact identity.
    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    /// Feature columns in the order the model consumes them.
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Fitted scaler.
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Fitted classifier.
    pub fn classifier(&self) -> &dyn Classifier {
        &self.classifier
    }

    /// Training summary.
    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    /// Check that columns, scaler and classifier agree.
    pub fn validate(&self) -> Result<()> {
        let schema = FeatureSchema::new(self.feature_columns.clone())
            .map_err(|e| Error::model(format!("artifact feature columns: {e}")))?;
        self.scaler.validate()?;
        self.classifier.validate()?;

        let n = self.feature_columns.len();
        if self.scaler.dim() != n {
            return Err(Error::model(format!(
                "scaler expects {} features, artifact lists {n}",
                self.scaler.dim()
            )));
        }
        if self.classifier.dim() != Some(n) {
            return Err(Error::model(format!(
                "classifier expects {:?} features, artifact lists {n}",
                self.classifier.dim()
            )));
        }
        if schema.fingerprint() != self.version.schema_fingerprint {
            return Err(Error::model("schema fingerprint does not match feature columns"));
        }
        Ok(())
    }

    /// Reject a schema that differs in names, order or length.
    pub fn verify_schema(&self, schema: &FeatureSchema) -> Result<()> {
        match schema.diff(&self.feature_columns) {
            Some(reason) => Err(Error::artifact_mismatch(reason)),
            None => Ok(()),
        }
    }

    /// Scale a vector given in artifact column order and score it.
    pub fn predict_proba(&self, features: &[f64]) -> Result<Probabilities> {
        let scaled = self.scaler.transform_row(features)?;
        self.classifier.predict_proba(&scaled)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), id = %self.version.id, "saved model artifact");
        Ok(())
    }

    /// Load and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&content)?;
        artifact.validate()?;
        info!(
            path = %path.display(),
            id = %artifact.version.id,
            features = artifact.feature_columns.len(),
            "loaded model artifact"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::GaussianNb;
    use crate::forest::RandomForest;
    use signal_core::config::ForestConfig;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["close".into(), "rsi_14".into()]).unwrap()
    }

    fn training_rows() -> (Vec<Vec<f64>>, Vec<Signal>) {
        let x = vec![
            vec![100.0, 30.0],
            vec![101.0, 35.0],
            vec![105.0, 60.0],
            vec![106.0, 65.0],
            vec![110.0, 80.0],
            vec![111.0, 85.0],
        ];
        let y = vec![
            Signal::Sell,
            Signal::Sell,
            Signal::Hold,
            Signal::Hold,
            Signal::Buy,
            Signal::Buy,
        ];
        (x, y)
    }

    fn info(model_type: &str) -> ModelInfo {
        ModelInfo {
            model_type: model_type.to_string(),
            n_features: 2,
            n_samples: 6,
            train_rows: 6,
            test_rows: 0,
            train_accuracy: 1.0,
            test_accuracy: None,
            label_threshold_pct: 0.5,
            class_distribution: BTreeMap::new(),
            data_start: None,
            data_end: None,
            feature_importances: Vec::new(),
        }
    }

    fn artifact() -> ModelArtifact {
        let (x, y) = training_rows();
        let scaler = StandardScaler::fit(&x).unwrap();
        let mut classifier = GaussianNb::default();
        classifier.fit(&scaler.transform(&x).unwrap(), &y).unwrap();
        let info = info(classifier.name());
        ModelArtifact::new(&schema(), scaler, classifier, info, Utc::now()).unwrap()
    }

    #[test]
    fn test_forest_artifact_round_trip() {
        let (x, y) = training_rows();
        let scaler = StandardScaler::fit(&x).unwrap();
        let mut forest = RandomForest::new(
            ForestConfig {
                n_trees: 10,
                min_samples_split: 2,
                min_samples_leaf: 1,
                ..ForestConfig::default()
            },
            true,
            42,
        );
        forest.fit(&scaler.transform(&x).unwrap(), &y).unwrap();
        let artifact =
            ModelArtifact::new(&schema(), scaler, forest, info("random_forest"), Utc::now())
                .unwrap();
        assert!(artifact.version().id.starts_with("random_forest-"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.json");
        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded, artifact);
        let input = [104.0, 58.0];
        assert_eq!(
            loaded.predict_proba(&input).unwrap(),
            artifact.predict_proba(&input).unwrap()
        );
    }

    #[test]
    fn test_importance_ranking() {
        let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranking = FeatureImportance::ranking(&columns, &[0.2, 0.6, 0.2]);
        let names: Vec<&str> = ranking.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(ranking[0].importance, 0.6);
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let artifact = artifact();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded.feature_columns(), artifact.feature_columns());
        assert_eq!(loaded.version(), artifact.version());
        let input = [104.0, 58.0];
        assert_eq!(
            loaded.predict_proba(&input).unwrap(),
            artifact.predict_proba(&input).unwrap()
        );
    }

    #[test]
    fn test_verify_schema() {
        let artifact = artifact();
        assert!(artifact.verify_schema(&schema()).is_ok());

        let reordered = FeatureSchema::new(vec!["rsi_14".into(), "close".into()]).unwrap();
        assert!(matches!(
            artifact.verify_schema(&reordered),
            Err(Error::ArtifactMismatch(_))
        ));

        let longer =
            FeatureSchema::new(vec!["close".into(), "rsi_14".into(), "roc_10".into()]).unwrap();
        assert!(matches!(
            artifact.verify_schema(&longer),
            Err(Error::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_load_rejects_inconsistent_dimensions() {
        let artifact = artifact();
        let mut value = serde_json::to_value(&artifact).unwrap();
        value["feature_columns"] = serde_json::json!(["close"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, value.to_string()).unwrap();

        assert!(matches!(ModelArtifact::load(&path), Err(Error::Model(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ModelArtifact::load(dir.path().join("absent.json")),
            Err(Error::Io(_))
        ));
    }
}
