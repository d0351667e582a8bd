//! Prediction requests and responses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use signal_core::{Error, Result, Signal};
use std::collections::BTreeMap;

use signal_model::ModelInfo;

/// Same-day price action supplied by the caller instead of a stored date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// What a caller asks the resolver to score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PredictRequest {
    /// Score the stored row for an exact date.
    ByDate(NaiveDate),
    /// Score a bar that is not in the dataset. Not served.
    ManualInput(ManualBar),
}

impl PredictRequest {
    /// Parse `YYYY-MM-DD`; malformed input never reaches the model.
    pub fn from_date_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<NaiveDate>()
            .map(PredictRequest::ByDate)
            .map_err(|e| Error::data(format!("invalid date '{s}': {e}")))
    }
}

/// Risk attached to a signal for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Risk shown for a signal.
    pub fn for_signal(signal: Signal) -> Self {
        match signal {
            Signal::Buy => RiskLevel::Medium,
            Signal::Sell => RiskLevel::High,
            Signal::Hold => RiskLevel::Low,
        }
    }
}

/// Scored prediction for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub date: NaiveDate,
    pub signal: Signal,
    /// Probability of `signal` in percent, two decimals.
    pub confidence: f64,
    pub signal_numeric: u8,
    pub recommendation: String,
    pub risk_level: RiskLevel,
    pub predicted_movement: String,
}

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub model_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Dataset coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub total_days: usize,
}

/// Model and dataset statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub model_info: ModelInfo,
    pub data_range: DataRange,
    pub signal_distribution: BTreeMap<Signal, usize>,
}

/// Stored price action and the realised label for a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub signal: Signal,
}

/// Dates that can be requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableDates {
    pub total_dates: usize,
    pub date_range: DataRange,
    /// The most recent dates, ascending.
    pub sample_dates: Vec<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_date_str() {
        let req = PredictRequest::from_date_str(" 2024-03-15 ").unwrap();
        assert_eq!(
            req,
            PredictRequest::ByDate(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert!(matches!(
            PredictRequest::from_date_str("15/03/2024"),
            Err(Error::Data(_))
        ));
        assert!(PredictRequest::from_date_str("").is_err());
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::for_signal(Signal::Buy), RiskLevel::Medium);
        assert_eq!(RiskLevel::for_signal(Signal::Sell), RiskLevel::High);
        assert_eq!(RiskLevel::for_signal(Signal::Hold), RiskLevel::Low);
    }

    #[test]
    fn test_request_json_shape() {
        let req = PredictRequest::from_date_str("2024-03-15").unwrap();
        let json = serde_json::to_value(req).unwrap();
        assert_eq!(json["kind"], "by_date");
    }
}
