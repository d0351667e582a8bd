//! Configuration structures for the index-signal system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::FeatureSchema;

/// Main configuration for the signal pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Raw observation source configuration.
    pub ingestion: IngestionConfig,
    /// Indicator configuration.
    pub features: FeatureConfig,
    /// Label configuration.
    pub labeling: LabelConfig,
    /// Dataset assembly configuration.
    pub dataset: DatasetConfig,
    /// Classifier training configuration.
    pub training: TrainingConfig,
    /// Serving configuration.
    pub serving: ServingConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.labeling.validate()?;
        self.training.validate()?;
        Ok(())
    }
}

/// Column mapping for raw observation CSV files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Date column (may be wrapped as `="dd-mm-yy"`).
    pub date_column: String,
    /// Time-of-day column.
    pub time_column: String,
    /// Price column.
    pub price_column: String,
    /// Volume column.
    pub volume_column: String,
    /// Open interest column.
    pub open_interest_column: String,
    /// Implied volatility column.
    pub implied_volatility_column: String,
    /// chrono format of `"{date} {time}"`.
    pub datetime_format: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            time_column: "time".to_string(),
            price_column: "spot".to_string(),
            volume_column: "volume".to_string(),
            open_interest_column: "oi".to_string(),
            implied_volatility_column: "iv".to_string(),
            datetime_format: "%d-%m-%y %H:%M:%S".to_string(),
        }
    }
}

/// Standard deviation estimator used by Bollinger bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdDevKind {
    /// Divide by n - 1.
    Sample,
    /// Divide by n.
    Population,
}

/// Indicator windows and spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Simple moving average windows over close.
    pub sma_windows: Vec<usize>,
    /// Fast EMA span (also MACD fast leg).
    pub ema_fast: usize,
    /// Slow EMA span (also MACD slow leg).
    pub ema_slow: usize,
    /// EMA span of the MACD signal line.
    pub macd_signal: usize,
    /// RSI lookback in deltas.
    pub rsi_period: usize,
    /// Bollinger window.
    pub bollinger_window: usize,
    /// Bollinger band width in standard deviations.
    pub bollinger_k: f64,
    /// Bollinger standard deviation estimator.
    pub bollinger_std: StdDevKind,
    /// Rate-of-change period.
    pub roc_period: usize,
    /// Volume SMA window for the volume ratio.
    pub volume_window: usize,
    /// Lag offsets for close and volume.
    pub lags: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sma_windows: vec![5, 10, 20, 50],
            ema_fast: 12,
            ema_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            bollinger_window: 20,
            bollinger_k: 2.0,
            bollinger_std: StdDevKind::Sample,
            roc_period: 10,
            volume_window: 20,
            lags: vec![1, 2, 3, 5, 7],
        }
    }
}

impl FeatureConfig {
    fn validate(&self) -> Result<()> {
        if self.sma_windows.is_empty() || self.sma_windows.contains(&0) {
            return Err(Error::config("sma_windows must be non-empty and positive"));
        }
        let mut sorted = self.sma_windows.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != self.sma_windows.len() {
            return Err(Error::config("sma_windows must be unique"));
        }
        if self.ema_fast == 0 || self.ema_slow == 0 || self.macd_signal == 0 {
            return Err(Error::config("EMA spans must be positive"));
        }
        if self.ema_fast == self.ema_slow {
            return Err(Error::config("ema_fast and ema_slow must differ"));
        }
        if self.rsi_period == 0 || self.roc_period == 0 || self.volume_window == 0 {
            return Err(Error::config("rsi_period, roc_period and volume_window must be positive"));
        }
        if self.bollinger_window < 2 {
            return Err(Error::config("bollinger_window must be at least 2"));
        }
        if !(self.bollinger_k.is_finite() && self.bollinger_k > 0.0) {
            return Err(Error::config("bollinger_k must be positive"));
        }
        if self.lags.contains(&0) {
            return Err(Error::config("lags must be positive"));
        }
        let mut lags = self.lags.clone();
        lags.sort_unstable();
        lags.dedup();
        if lags.len() != self.lags.len() {
            return Err(Error::config("lags must be unique"));
        }
        Ok(())
    }

    /// Longest trailing window, in bars, any feature needs (inclusive of the current bar).
    pub fn longest_window(&self) -> usize {
        self.warmup() + 1
    }

    /// Number of leading bars for which at least one feature is undefined.
    pub fn warmup(&self) -> usize {
        let sma = self.sma_windows.iter().map(|w| w.saturating_sub(1)).max().unwrap_or(0);
        let lags = self.lags.iter().copied().max().unwrap_or(0);
        [
            sma,
            self.bollinger_window.saturating_sub(1),
            self.volume_window.saturating_sub(1),
            self.rsi_period,
            self.roc_period,
            lags,
            // daily_return needs one prior close
            1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Canonical ordered feature columns produced by this configuration.
    pub fn schema(&self) -> Result<FeatureSchema> {
        let mut columns: Vec<String> = [
            "open",
            "high",
            "low",
            "close",
            "volume",
            "open_interest",
            "implied_volatility",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        columns.extend(self.sma_windows.iter().map(|w| format!("sma_{w}")));
        columns.push(format!("ema_{}", self.ema_fast));
        columns.push(format!("ema_{}", self.ema_slow));
        columns.extend(
            ["macd", "macd_signal", "macd_diff"]
                .iter()
                .map(|s| s.to_string()),
        );
        columns.push(format!("rsi_{}", self.rsi_period));
        columns.extend(
            ["bb_middle", "bb_upper", "bb_lower", "bb_width"]
                .iter()
                .map(|s| s.to_string()),
        );
        columns.push(format!("roc_{}", self.roc_period));
        columns.extend(
            ["volume_ratio", "price_change_pct", "high_low_diff", "daily_return"]
                .iter()
                .map(|s| s.to_string()),
        );
        for lag in &self.lags {
            columns.push(format!("close_lag_{lag}"));
            columns.push(format!("volume_lag_{lag}"));
        }

        FeatureSchema::new(columns)
    }
}

/// Forward-return labeling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Dead-zone half width in percent.
    pub threshold_pct: f64,
    /// Bars ahead used for the forward return.
    pub horizon: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            threshold_pct: 0.5,
            horizon: 1,
        }
    }
}

impl LabelConfig {
    fn validate(&self) -> Result<()> {
        if !(self.threshold_pct.is_finite() && self.threshold_pct >= 0.0) {
            return Err(Error::config("threshold_pct must be a non-negative number"));
        }
        if self.horizon == 0 {
            return Err(Error::config("horizon must be at least 1"));
        }
        Ok(())
    }
}

/// Dataset assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Minimum complete rows; defaults to the longest feature window.
    pub min_rows: Option<usize>,
}

/// Classifier family fitted by the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Bagged CART trees with Gini splits.
    RandomForest,
    /// Gaussian naive Bayes.
    GaussianNb,
}

/// Random forest shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees.
    pub n_trees: usize,
    /// Maximum depth of each tree; the root is depth 0.
    pub max_depth: usize,
    /// Minimum samples a node needs to be split.
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` is the floor of the square root of the width.
    pub max_features: Option<usize>,
    /// Fit each tree on a bootstrap sample instead of every row.
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 15,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            bootstrap: true,
        }
    }
}

impl ForestConfig {
    fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(Error::config("n_trees must be at least 1"));
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::config("min_samples_leaf must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(Error::config("min_samples_split must be at least 2"));
        }
        if self.max_features == Some(0) {
            return Err(Error::config("max_features must be at least 1"));
        }
        Ok(())
    }
}

/// Classifier training.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Classifier to fit.
    pub model: ModelKind,
    /// Fraction of rows held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the train/test shuffle and the forest's bootstrap draws.
    pub seed: u64,
    /// Keep class proportions equal across the split.
    pub stratify: bool,
    /// Weight classes inversely to their frequency.
    pub balanced: bool,
    /// Fraction of the largest feature variance added to every variance (naive Bayes).
    pub var_smoothing: f64,
    /// Random forest shape.
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::RandomForest,
            test_fraction: 0.2,
            seed: 42,
            stratify: true,
            balanced: true,
            var_smoothing: 1e-9,
            forest: ForestConfig::default(),
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(Error::config("test_fraction must be in [0, 1)"));
        }
        if !(self.var_smoothing.is_finite() && self.var_smoothing > 0.0) {
            return Err(Error::config("var_smoothing must be positive"));
        }
        self.forest.validate()
    }
}

/// Serving paths and presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Persisted dataset CSV.
    pub dataset_path: PathBuf,
    /// Persisted model artifact JSON.
    pub artifact_path: PathBuf,
    /// Instrument name used in recommendation text.
    pub instrument: String,
    /// Number of trailing dates listed by `available_dates`.
    pub sample_dates: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("index_features.csv"),
            artifact_path: PathBuf::from("index_model.json"),
            instrument: "NIFTY".to_string(),
            sample_dates: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.features.sma_windows, vec![5, 10, 20, 50]);
        assert_eq!(config.labeling.threshold_pct, 0.5);
        assert_eq!(config.training.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_schema() {
        let schema = FeatureConfig::default().schema().unwrap();
        assert_eq!(schema.len(), 36);
        assert_eq!(schema.columns()[0], "open");
        assert_eq!(schema.columns()[16], "rsi_14");
        assert_eq!(schema.columns()[35], "volume_lag_7");
    }

    #[test]
    fn test_default_warmup() {
        let features = FeatureConfig::default();
        assert_eq!(features.warmup(), 49);
        assert_eq!(features.longest_window(), 50);
    }

    #[test]
    fn test_warmup_follows_lags() {
        let features = FeatureConfig {
            sma_windows: vec![3],
            bollinger_window: 3,
            volume_window: 3,
            rsi_period: 2,
            roc_period: 2,
            lags: vec![1, 9],
            ..FeatureConfig::default()
        };
        assert_eq!(features.warmup(), 9);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = Config::default();
        config.features.lags = vec![1, 1];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.labeling.horizon = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.forest.n_trees = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"labeling": {{"threshold_pct": 1.0}}}}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.labeling.threshold_pct, 1.0);
        assert_eq!(config.labeling.horizon, 1);
        assert_eq!(config.features.rsi_period, 14);
        assert_eq!(config.training.model, ModelKind::RandomForest);
        assert_eq!(config.training.forest.n_trees, 200);
    }

    #[test]
    fn test_model_kind_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"training": {{"model": "gaussian_nb", "forest": {{"max_depth": 4}}}}}}"#
        )
        .unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.training.model, ModelKind::GaussianNb);
        assert_eq!(config.training.forest.max_depth, 4);
        assert_eq!(config.training.forest.min_samples_leaf, 2);
    }
}
