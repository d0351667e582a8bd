//! Request resolution against a serving context.

use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use signal_core::{Error, Result, Signal};
use std::sync::Arc;
use tracing::debug;

use signal_model::argmax;

use crate::context::ServingContext;
use crate::request::{
    AvailableDates, DataRange, HealthStatus, HistoricalBar, PredictRequest, PredictionResponse,
    RiskLevel, ServiceStats,
};

/// Answers prediction and lookup requests. Cheap to clone; safe to share across threads.
#[derive(Debug, Clone)]
pub struct SignalResolver {
    context: Arc<ServingContext>,
}

impl SignalResolver {
    /// Create a resolver over a loaded context.
    pub fn new(context: Arc<ServingContext>) -> Self {
        Self { context }
    }

    /// Shared context.
    pub fn context(&self) -> &ServingContext {
        &self.context
    }

    /// Score a request.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictionResponse> {
        match request {
            PredictRequest::ByDate(date) => self.predict_date(*date),
            PredictRequest::ManualInput(_) => Err(Error::not_implemented(
                "manual input is not supported; request a date",
            )),
        }
    }

    /// Score many requests in parallel; results keep request order.
    pub fn predict_batch(&self, requests: &[PredictRequest]) -> Vec<Result<PredictionResponse>> {
        requests.par_iter().map(|r| self.predict(r)).collect()
    }

    fn predict_date(&self, date: NaiveDate) -> Result<PredictionResponse> {
        let ctx = &self.context;
        let row = ctx.dataset().get(date).ok_or(Error::UnknownDate(date))?;

        let features = ctx.features_for(row);
        let proba = ctx.artifact().predict_proba(features)?;
        let signal = argmax(&proba);
        let confidence = (proba[signal.index()] * 10_000.0).round() / 100.0;
        debug!(%date, %signal, confidence, "prediction");

        Ok(PredictionResponse {
            date,
            signal,
            confidence,
            signal_numeric: signal.numeric(),
            recommendation: self.recommendation(signal),
            risk_level: RiskLevel::for_signal(signal),
            predicted_movement: self.movement(signal),
        })
    }

    fn recommendation(&self, signal: Signal) -> String {
        let instrument = self.context.instrument();
        match signal {
            Signal::Buy => format!(
                "Consider buying {instrument}. The model predicts upward movement."
            ),
            Signal::Sell => format!(
                "Consider selling or avoiding {instrument}. The model predicts downward movement."
            ),
            Signal::Hold => {
                "Hold current position. The model predicts sideways movement.".to_string()
            }
        }
    }

    fn movement(&self, signal: Signal) -> String {
        let t = self.context.threshold_pct();
        match signal {
            Signal::Buy => format!("Upward (>{t}%)"),
            Signal::Sell => format!("Downward (<-{t}%)"),
            Signal::Hold => format!("Sideways (-{t}% to +{t}%)"),
        }
    }

    /// Liveness; a resolver only exists with a loaded model.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            model_loaded: true,
            model_id: self.context.artifact().version().id.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Model info, dataset range and label distribution.
    pub fn stats(&self) -> ServiceStats {
        let summary = self.context.dataset().summary();
        ServiceStats {
            model_info: self.context.artifact().info().clone(),
            data_range: DataRange {
                start: summary.start,
                end: summary.end,
                total_days: summary.total_days,
            },
            signal_distribution: summary.signal_distribution,
        }
    }

    /// Stored OHLCV and realised label for a date.
    pub fn historical(&self, date: NaiveDate) -> Result<HistoricalBar> {
        let dataset = self.context.dataset();
        let row = dataset.get(date).ok_or(Error::UnknownDate(date))?;
        let field = |name: &str| {
            dataset
                .value(row, name)
                .ok_or_else(|| Error::data(format!("dataset has no '{name}' column")))
        };

        Ok(HistoricalBar {
            date,
            open: field("open")?,
            high: field("high")?,
            low: field("low")?,
            close: field("close")?,
            volume: field("volume")?,
            signal: row.label,
        })
    }

    /// Row count, range and the most recent dates.
    pub fn available_dates(&self) -> AvailableDates {
        let dataset = self.context.dataset();
        let dates: Vec<NaiveDate> = dataset.dates().collect();
        let keep = self.context.sample_dates().min(dates.len());

        AvailableDates {
            total_dates: dates.len(),
            date_range: DataRange {
                start: dates.first().copied(),
                end: dates.last().copied(),
                total_days: dates.len(),
            },
            sample_dates: dates[dates.len() - keep..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_resolver_is_send_sync() {
        assert_send_sync::<SignalResolver>();
        assert_send_sync::<ServingContext>();
    }
}
