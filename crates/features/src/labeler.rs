//! Forward-return labeling with a dead zone.
//!
//! The label of row `t` is a property of the day you would act on: it is
//! computed from `close[t + h]` and must never be used as a feature of row `t`.

use serde::{Deserialize, Serialize};
use signal_core::config::LabelConfig;
use signal_core::{DailyBar, Signal};
use std::ops::{Bound, RangeBounds};

/// Maps a return interval to a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalRule {
    /// Lower bound of the return in percent.
    pub lower: Bound<f64>,
    /// Upper bound of the return in percent.
    pub upper: Bound<f64>,
    /// Signal for returns inside the interval.
    pub signal: Signal,
}

impl IntervalRule {
    /// Whether a return falls inside this rule's interval.
    pub fn contains(&self, value: f64) -> bool {
        (self.lower, self.upper).contains(&value)
    }
}

/// Forward return and its class for one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// (close[t + h] - close[t]) / close[t] * 100.
    pub forward_return_pct: f64,
    /// Class of the forward return.
    pub signal: Signal,
}

/// Labeler with rules fixed at construction.
#[derive(Debug, Clone)]
pub struct Labeler {
    rules: [IntervalRule; 3],
    horizon: usize,
}

impl Labeler {
    /// Build the interval rules for a dead zone of `threshold_pct`.
    ///
    /// `(t, +inf) -> BUY`, `(-inf, -t) -> SELL`, `[-t, t] -> HOLD`.
    pub fn new(config: &LabelConfig) -> Self {
        let t = config.threshold_pct;
        Self {
            rules: [
                IntervalRule {
                    lower: Bound::Excluded(t),
                    upper: Bound::Unbounded,
                    signal: Signal::Buy,
                },
                IntervalRule {
                    lower: Bound::Unbounded,
                    upper: Bound::Excluded(-t),
                    signal: Signal::Sell,
                },
                IntervalRule {
                    lower: Bound::Included(-t),
                    upper: Bound::Included(t),
                    signal: Signal::Hold,
                },
            ],
            horizon: config.horizon,
        }
    }

    /// The ordered rules.
    pub fn rules(&self) -> &[IntervalRule] {
        &self.rules
    }

    /// Bars ahead used for the forward return.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Classify a forward return. `None` for NaN.
    pub fn classify(&self, return_pct: f64) -> Option<Signal> {
        self.rules
            .iter()
            .find(|rule| rule.contains(return_pct))
            .map(|rule| rule.signal)
    }

    /// Forward returns in percent; undefined for the last `horizon` rows.
    pub fn forward_returns(&self, closes: &[f64]) -> Vec<Option<f64>> {
        (0..closes.len())
            .map(|t| {
                let future = *closes.get(t + self.horizon)?;
                let current = closes[t];
                if current == 0.0 {
                    return None;
                }
                let r = (future - current) / current * 100.0;
                r.is_finite().then_some(r)
            })
            .collect()
    }

    /// Labels for every bar; `None` where no forward return exists.
    pub fn label(&self, bars: &[DailyBar]) -> Vec<Option<Label>> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        self.forward_returns(&closes)
            .into_iter()
            .map(|r| {
                let r = r?;
                Some(Label {
                    forward_return_pct: r,
                    signal: self.classify(r)?,
                })
            })
            .collect()
    }
}

impl Default for Labeler {
    fn default() -> Self {
        Self::new(&LabelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_bars;
    use approx::assert_relative_eq;

    #[test]
    fn test_five_day_scenario() {
        let bars = make_bars(&[100.0, 101.0, 99.0, 100.6, 100.4]);
        let labels = Labeler::default().label(&bars);

        let expected_returns = [1.0, -1.980198, 1.616162, -0.198807];
        let expected_signals = [Signal::Buy, Signal::Sell, Signal::Buy, Signal::Hold];
        for i in 0..4 {
            let label = labels[i].unwrap();
            assert_relative_eq!(label.forward_return_pct, expected_returns[i], epsilon = 1e-5);
            assert_eq!(label.signal, expected_signals[i]);
        }
        assert!(labels[4].is_none());
    }

    #[test]
    fn test_boundaries_are_hold() {
        let labeler = Labeler::default();
        assert_eq!(labeler.classify(0.5), Some(Signal::Hold));
        assert_eq!(labeler.classify(-0.5), Some(Signal::Hold));
        assert_eq!(labeler.classify(0.0), Some(Signal::Hold));
        assert_eq!(labeler.classify(0.5000001), Some(Signal::Buy));
        assert_eq!(labeler.classify(-0.5000001), Some(Signal::Sell));
        assert_eq!(labeler.classify(f64::NAN), None);
    }

    #[test]
    fn test_rules_partition_the_line() {
        let labeler = Labeler::default();
        for r in [-1e9, -0.51, -0.5, 0.49, 0.5, 0.51, 1e9] {
            let hits = labeler.rules().iter().filter(|rule| rule.contains(r)).count();
            assert_eq!(hits, 1, "return {r} matched {hits} rules");
        }
    }

    #[test]
    fn test_horizon() {
        let labeler = Labeler::new(&LabelConfig {
            threshold_pct: 0.5,
            horizon: 2,
        });
        let returns = labeler.forward_returns(&[100.0, 50.0, 110.0, 120.0]);
        assert_relative_eq!(returns[0].unwrap(), 10.0);
        assert_relative_eq!(returns[1].unwrap(), 140.0);
        assert_eq!(returns[2], None);
        assert_eq!(returns[3], None);
    }

    #[test]
    fn test_zero_close_has_no_label() {
        let returns = Labeler::default().forward_returns(&[0.0, 1.0]);
        assert_eq!(returns[0], None);
    }
}
