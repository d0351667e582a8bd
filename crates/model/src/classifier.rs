//! Three-class classifiers over standardized feature vectors.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use signal_core::{Error, Result, Signal};
use statrs::distribution::{Continuous, Normal};
use std::cmp::Reverse;

use crate::forest::RandomForest;
use crate::scaler::matrix_width;

/// Probabilities indexed by `Signal::index()`.
pub type Probabilities = [f64; 3];

/// A fitted model mapping a feature vector to class probabilities.
pub trait Classifier: Send + Sync {
    /// Fit on row-major features and aligned labels.
    fn fit(&mut self, x: &[Vec<f64>], y: &[Signal]) -> Result<()>;

    /// Class probabilities; sums to 1.
    fn predict_proba(&self, x: &[f64]) -> Result<Probabilities>;

    /// Number of features the model was fitted on.
    fn dim(&self) -> Option<usize>;

    /// Model name for reports.
    fn name(&self) -> &str;

    /// Most probable class.
    fn predict(&self, x: &[f64]) -> Result<Signal> {
        Ok(argmax(&self.predict_proba(x)?))
    }

    /// Relative importance of each feature, summing to 1; `None` when the
    /// model has no such measure.
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }
}

/// Class with the highest probability; ties go to the lower class index.
pub fn argmax(proba: &Probabilities) -> Signal {
    Signal::ALL
        .into_iter()
        .max_by_key(|s| (OrderedFloat(proba[s.index()]), Reverse(s.index())))
        .unwrap_or(Signal::Hold)
}

/// A fitted classifier of any supported family, as stored in an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedClassifier {
    RandomForest(RandomForest),
    GaussianNb(GaussianNb),
}

impl FittedClassifier {
    /// Check internal consistency after deserialization.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::RandomForest(model) => model.validate(),
            Self::GaussianNb(model) => model.validate(),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Self::RandomForest(model) => model,
            Self::GaussianNb(model) => model,
        }
    }
}

impl Classifier for FittedClassifier {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Signal]) -> Result<()> {
        match self {
            Self::RandomForest(model) => model.fit(x, y),
            Self::GaussianNb(model) => model.fit(x, y),
        }
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Probabilities> {
        self.inner().predict_proba(x)
    }

    fn dim(&self) -> Option<usize> {
        self.inner().dim()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.inner().feature_importances()
    }
}

impl From<RandomForest> for FittedClassifier {
    fn from(model: RandomForest) -> Self {
        Self::RandomForest(model)
    }
}

impl From<GaussianNb> for FittedClassifier {
    fn from(model: GaussianNb) -> Self {
        Self::GaussianNb(model)
    }
}

/// Per-class Gaussian statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    /// Class these statistics belong to.
    pub signal: Signal,
    /// Training rows of this class.
    pub count: usize,
    /// Prior probability.
    pub prior: f64,
    /// Per-feature mean.
    pub mean: Vec<f64>,
    /// Per-feature variance, smoothing included.
    pub var: Vec<f64>,
}

/// Gaussian naive Bayes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNb {
    /// Uniform priors over the observed classes instead of class frequencies.
    pub balanced: bool,
    /// Fraction of the largest feature variance added to every variance.
    pub var_smoothing: f64,
    classes: Vec<ClassStats>,
}

impl GaussianNb {
    /// Unfitted model.
    pub fn new(balanced: bool, var_smoothing: f64) -> Self {
        Self {
            balanced,
            var_smoothing,
            classes: Vec::new(),
        }
    }

    /// Fitted class statistics, ascending by class.
    pub fn classes(&self) -> &[ClassStats] {
        &self.classes
    }

    /// Whether `fit` has run.
    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }

    /// Check internal consistency after deserialization.
    pub fn validate(&self) -> Result<()> {
        let dim = self
            .dim()
            .ok_or_else(|| Error::model("classifier has no fitted classes"))?;
        for (i, stats) in self.classes.iter().enumerate() {
            if stats.mean.len() != dim || stats.var.len() != dim {
                return Err(Error::model(format!(
                    "class {} has inconsistent dimensions",
                    stats.signal
                )));
            }
            if stats.var.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(Error::model(format!(
                    "class {} has a non-positive variance",
                    stats.signal
                )));
            }
            if i > 0 && stats.signal <= self.classes[i - 1].signal {
                return Err(Error::model("classes must be unique and ascending"));
            }
        }
        let total: f64 = self.classes.iter().map(|c| c.prior).sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(Error::model(format!("priors sum to {total}")));
        }
        Ok(())
    }

    fn joint_log_likelihood(&self, stats: &ClassStats, x: &[f64]) -> Result<f64> {
        let mut total = stats.prior.ln();
        for ((&value, &mean), &var) in x.iter().zip(&stats.mean).zip(&stats.var) {
            let normal = Normal::new(mean, var.sqrt())
                .map_err(|e| Error::model(format!("invalid class distribution: {e}")))?;
            total += normal.ln_pdf(value);
        }
        Ok(total)
    }
}

impl Default for GaussianNb {
    fn default() -> Self {
        Self::new(true, 1e-9)
    }
}

impl Classifier for GaussianNb {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Signal]) -> Result<()> {
        let width = matrix_width(x)?;
        if x.len() != y.len() {
            return Err(Error::model(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }

        // Smoothing is relative to the widest feature spread over all rows.
        let n = x.len() as f64;
        let max_var = (0..width)
            .map(|j| {
                let mean = x.iter().map(|r| r[j]).sum::<f64>() / n;
                x.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n
            })
            .fold(0.0_f64, f64::max);
        let epsilon = if max_var > 0.0 {
            self.var_smoothing * max_var
        } else {
            self.var_smoothing
        };

        let mut classes = Vec::new();
        for signal in Signal::ALL {
            let rows: Vec<&Vec<f64>> = x
                .iter()
                .zip(y)
                .filter(|(_, label)| **label == signal)
                .map(|(row, _)| row)
                .collect();
            if rows.is_empty() {
                continue;
            }
            let count = rows.len() as f64;
            let mean: Vec<f64> = (0..width)
                .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / count)
                .collect();
            let var: Vec<f64> = (0..width)
                .map(|j| {
                    rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / count + epsilon
                })
                .collect();
            classes.push(ClassStats {
                signal,
                count: rows.len(),
                prior: 0.0,
                mean,
                var,
            });
        }

        let observed = classes.len() as f64;
        for stats in &mut classes {
            stats.prior = if self.balanced {
                1.0 / observed
            } else {
                stats.count as f64 / n
            };
        }

        self.classes = classes;
        Ok(())
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Probabilities> {
        let dim = self
            .dim()
            .ok_or_else(|| Error::model("classifier is not fitted"))?;
        if x.len() != dim {
            return Err(Error::model(format!(
                "input has {} features, classifier expects {dim}",
                x.len()
            )));
        }

        let scores = self
            .classes
            .iter()
            .map(|stats| self.joint_log_likelihood(stats, x))
            .collect::<Result<Vec<f64>>>()?;

        // log-sum-exp
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = scores.iter().map(|s| (s - max).exp()).sum();

        let mut proba = [0.0; 3];
        for (stats, score) in self.classes.iter().zip(&scores) {
            proba[stats.signal.index()] = (score - max).exp() / sum;
        }
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(Error::model("non-finite class probability"));
        }
        Ok(proba)
    }

    fn dim(&self) -> Option<usize> {
        self.classes.first().map(|c| c.mean.len())
    }

    fn name(&self) -> &str {
        "gaussian_nb"
    }
}
