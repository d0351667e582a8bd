//! Classifier boundary for the index-signal system.
//!
//! This crate provides:
//! - Feature standardization
//! - The classifier trait with random forest and Gaussian naive Bayes implementations
//! - Seeded stratified train/test splitting
//! - Classification metrics
//! - The model artifact bundle (columns, scaler, classifier, info)

pub mod artifact;
pub mod classifier;
pub mod forest;
pub mod metrics;
pub mod scaler;
pub mod split;
pub mod trainer;

pub use artifact::{FeatureImportance, ModelArtifact, ModelInfo, ModelVersion};
pub use classifier::{argmax, Classifier, FittedClassifier, GaussianNb, Probabilities};
pub use forest::{DecisionTree, RandomForest};
pub use metrics::ClassificationReport;
pub use scaler::StandardScaler;
pub use trainer::{Trainer, TrainingOutcome};
