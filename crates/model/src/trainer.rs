//! Training: split, scale, fit, evaluate, bundle.

use chrono::Utc;
use signal_core::config::{ModelKind, TrainingConfig};
use signal_core::{Config, Result, Signal};
use signal_features::Dataset;
use tracing::info;

use crate::artifact::{FeatureImportance, ModelArtifact, ModelInfo};
use crate::classifier::{Classifier, FittedClassifier, GaussianNb};
use crate::forest::RandomForest;
use crate::metrics::ClassificationReport;
use crate::scaler::StandardScaler;
use crate::split::train_test_split;

/// Fitted artifact plus its held-out evaluation.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Artifact ready to save.
    pub artifact: ModelArtifact,
    /// Metrics on the training rows.
    pub train_report: ClassificationReport,
    /// Metrics on the held-out rows; empty when nothing was held out.
    pub test_report: ClassificationReport,
}

/// Trains the configured classifier on a dataset.
pub struct Trainer {
    config: TrainingConfig,
    threshold_pct: f64,
}

impl Trainer {
    /// Create a trainer from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.training.clone(),
            threshold_pct: config.labeling.threshold_pct,
        })
    }

    /// Fit on the training split and evaluate on the held-out split.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        let (x, y) = dataset.to_xy();
        let split = train_test_split(
            &y,
            self.config.test_fraction,
            self.config.seed,
            self.config.stratify,
        )?;

        let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<Signal>) {
            idx.iter().map(|&i| (x[i].clone(), y[i])).unzip()
        };
        let (x_train, y_train) = pick(&split.train);
        let (x_test, y_test) = pick(&split.test);
        info!(
            train = x_train.len(),
            test = x_test.len(),
            seed = self.config.seed,
            "split dataset"
        );

        let scaler = StandardScaler::fit(&x_train)?;
        let x_train = scaler.transform(&x_train)?;
        let x_test = scaler.transform(&x_test)?;

        let mut classifier = self.classifier();
        classifier.fit(&x_train, &y_train)?;

        let predict_all = |rows: &[Vec<f64>]| -> Result<Vec<Signal>> {
            rows.iter().map(|r| classifier.predict(r)).collect()
        };
        let train_report = ClassificationReport::calculate(&y_train, &predict_all(&x_train)?);
        let test_report = ClassificationReport::calculate(&y_test, &predict_all(&x_test)?);

        info!(
            model = classifier.name(),
            train_accuracy = train_report.accuracy,
            test_accuracy = test_report.accuracy,
            "model trained"
        );

        let feature_importances = classifier
            .feature_importances()
            .map(|values| FeatureImportance::ranking(dataset.schema().columns(), values))
            .unwrap_or_default();

        let summary = dataset.summary();
        let model_info = ModelInfo {
            model_type: classifier.name().to_string(),
            n_features: dataset.schema().len(),
            n_samples: dataset.len(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            train_accuracy: train_report.accuracy,
            test_accuracy: (test_report.total > 0).then_some(test_report.accuracy),
            label_threshold_pct: self.threshold_pct,
            class_distribution: summary.signal_distribution,
            data_start: summary.start,
            data_end: summary.end,
            feature_importances,
        };

        let artifact = ModelArtifact::new(
            dataset.schema(),
            scaler,
            classifier,
            model_info,
            Utc::now(),
        )?;

        Ok(TrainingOutcome {
            artifact,
            train_report,
            test_report,
        })
    }

    fn classifier(&self) -> FittedClassifier {
        match self.config.model {
            ModelKind::RandomForest => RandomForest::new(
                self.config.forest.clone(),
                self.config.balanced,
                self.config.seed,
            )
            .into(),
            ModelKind::GaussianNb => {
                GaussianNb::new(self.config.balanced, self.config.var_smoothing).into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use signal_core::FeatureSchema;
    use signal_features::DatasetRow;

    fn dataset() -> Dataset {
        let schema = FeatureSchema::new(vec!["momentum".into(), "noise".into()]).unwrap();
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..90)
            .map(|i| {
                let label = Signal::ALL[i % 3];
                let centre = (label.numeric() as f64 - 1.0) * 3.0;
                DatasetRow {
                    date: base + chrono::Duration::days(i as i64),
                    features: vec![centre + (i % 7) as f64 * 0.05, (i % 5) as f64],
                    label,
                }
            })
            .collect();
        Dataset::new(schema, rows).unwrap()
    }

    #[test]
    fn test_train_separable_dataset() {
        let trainer = Trainer::new(&Config::default()).unwrap();
        let dataset = dataset();
        let outcome = trainer.train(&dataset).unwrap();

        assert_eq!(outcome.test_report.total, 18);
        assert_eq!(outcome.train_report.total, 72);
        assert!(outcome.test_report.accuracy > 0.95);

        let info = outcome.artifact.info();
        assert_eq!(info.n_features, 2);
        assert_eq!(info.n_samples, 90);
        assert_eq!(info.class_distribution[&Signal::Buy], 30);
        assert_eq!(outcome.artifact.feature_columns(), dataset.schema().columns());
        assert!(outcome.artifact.verify_schema(dataset.schema()).is_ok());

        assert_eq!(info.model_type, "random_forest");
        let ranking = &info.feature_importances;
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].feature, "momentum");
        let total: f64 = ranking.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_train_naive_bayes() {
        let mut config = Config::default();
        config.training.model = ModelKind::GaussianNb;
        let outcome = Trainer::new(&config).unwrap().train(&dataset()).unwrap();

        let info = outcome.artifact.info();
        assert_eq!(info.model_type, "gaussian_nb");
        assert!(info.feature_importances.is_empty());
        assert!(outcome.test_report.accuracy > 0.95);
    }

    #[test]
    fn test_training_is_deterministic() {
        let trainer = Trainer::new(&Config::default()).unwrap();
        let dataset = dataset();
        let a = trainer.train(&dataset).unwrap();
        let b = trainer.train(&dataset).unwrap();

        assert_eq!(a.artifact.scaler(), b.artifact.scaler());
        assert_eq!(a.test_report, b.test_report);
        assert_eq!(
            a.artifact.info().feature_importances,
            b.artifact.info().feature_importances
        );
    }

    #[test]
    fn test_no_holdout() {
        let mut config = Config::default();
        config.training.test_fraction = 0.0;
        let outcome = Trainer::new(&config).unwrap().train(&dataset()).unwrap();
        assert_eq!(outcome.test_report.total, 0);
        assert_eq!(outcome.artifact.info().test_accuracy, None);
    }
}
