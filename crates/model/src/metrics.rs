//! Classification metrics.
//!
//! Calculates accuracy, the confusion matrix and per-class scores from
//! true and predicted labels.

use serde::{Deserialize, Serialize};
use signal_core::Signal;
use std::fmt;

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    /// Correct predictions of this class / all predictions of this class.
    pub precision: f64,
    /// Correct predictions of this class / all true rows of this class.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// True rows of this class.
    pub support: usize,
}

/// Evaluation of a classifier on labelled rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Evaluated rows.
    pub total: usize,
    /// Fraction of rows predicted correctly (0-1).
    pub accuracy: f64,
    /// `confusion[true][predicted]`, indexed by `Signal::index()`.
    pub confusion: [[usize; 3]; 3],
    /// Scores indexed by `Signal::index()`.
    pub per_class: [ClassScore; 3],
    /// Unweighted mean F1 over classes with support.
    pub macro_f1: f64,
}

impl ClassificationReport {
    /// Build a report from aligned true and predicted labels.
    pub fn calculate(actual: &[Signal], predicted: &[Signal]) -> Self {
        let mut report = Self::default();
        if actual.is_empty() {
            return report;
        }

        for (a, p) in actual.iter().zip(predicted) {
            report.confusion[a.index()][p.index()] += 1;
            report.total += 1;
        }

        let correct: usize = (0..3).map(|i| report.confusion[i][i]).sum();
        report.accuracy = correct as f64 / report.total as f64;

        for signal in Signal::ALL {
            let k = signal.index();
            let tp = report.confusion[k][k] as f64;
            let support: usize = report.confusion[k].iter().sum();
            let predicted_k: usize = (0..3).map(|i| report.confusion[i][k]).sum();

            let precision = if predicted_k > 0 {
                tp / predicted_k as f64
            } else {
                0.0
            };
            let recall = if support > 0 { tp / support as f64 } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            report.per_class[k] = ClassScore {
                precision,
                recall,
                f1,
                support,
            };
        }

        let supported: Vec<f64> = report
            .per_class
            .iter()
            .filter(|s| s.support > 0)
            .map(|s| s.f1)
            .collect();
        report.macro_f1 = if supported.is_empty() {
            0.0
        } else {
            supported.iter().sum::<f64>() / supported.len() as f64
        };

        report
    }

    /// Scores for one class.
    pub fn score(&self, signal: Signal) -> &ClassScore {
        &self.per_class[signal.index()]
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>8} {:>10} {:>10} {:>10} {:>8}",
            "", "precision", "recall", "f1", "support"
        )?;
        for signal in Signal::ALL {
            let s = self.score(signal);
            writeln!(
                f,
                "{:>8} {:>10.3} {:>10.3} {:>10.3} {:>8}",
                signal.as_str(),
                s.precision,
                s.recall,
                s.f1,
                s.support
            )?;
        }
        writeln!(
            f,
            "accuracy {:.4} over {} rows (macro F1 {:.4})",
            self.accuracy, self.total, self.macro_f1
        )?;
        writeln!(f, "confusion (rows = actual SELL/HOLD/BUY):")?;
        for row in &self.confusion {
            writeln!(f, "  {:>5} {:>5} {:>5}", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}
