//! Momentum oscillators: MACD, RSI and rate of change.

use crate::moving_average::ema;
use crate::{finite, Series};

/// MACD line, signal line and histogram.
#[derive(Debug, Clone)]
pub struct Macd {
    /// EMA(fast) - EMA(slow).
    pub line: Vec<f64>,
    /// EMA(signal) of the MACD line.
    pub signal: Vec<f64>,
    /// line - signal.
    pub histogram: Vec<f64>,
}

impl Macd {
    /// Compute MACD from precomputed fast and slow EMAs.
    pub fn from_emas(fast: &[f64], slow: &[f64], signal_span: usize) -> Self {
        let line: Vec<f64> = fast.iter().zip(slow).map(|(f, s)| f - s).collect();
        let signal = ema(&line, signal_span);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        Self {
            line,
            signal,
            histogram,
        }
    }

    /// Compute MACD from closes.
    pub fn compute(closes: &[f64], fast: usize, slow: usize, signal_span: usize) -> Self {
        Self::from_emas(&ema(closes, fast), &ema(closes, slow), signal_span)
    }
}

/// Relative Strength Index over the trailing `period` close-to-close deltas.
///
/// Average gain and average loss are plain means over the window.
/// RSI = 100 - 100 / (1 + avg_gain / avg_loss).
/// Defined from index `period` onward (needs `period` deltas).
/// Edge cases: avg_loss == 0 with gains -> 100; no movement at all -> 50.
pub fn rsi(closes: &[f64], period: usize) -> Series {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n <= period {
        return result;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    for t in period..n {
        // deltas[t - 1] is close[t] - close[t - 1]
        let window = &deltas[t - period..t];
        let gain: f64 = window.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
        let loss: f64 = window.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;
        result[t] = finite(rsi_value(gain, loss));
    }
    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Rate of change in percent: (x[t] - x[t - p]) / x[t - p] * 100.
///
/// Undefined for t < p and where x[t - p] is zero.
pub fn roc(values: &[f64], period: usize) -> Series {
    let mut result = vec![None; values.len()];
    if period == 0 {
        return result;
    }

    for t in period..values.len() {
        let base = values[t - period];
        if base != 0.0 {
            result[t] = finite((values[t] - base) / base * 100.0);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rsi_all_gains() {
        let result = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0], 3);
        assert_eq!(result[2], None);
        assert_relative_eq!(result[3].unwrap(), 100.0);
        assert_relative_eq!(result[4].unwrap(), 100.0);
    }

    #[test]
    fn test_rsi_all_losses() {
        let result = rsi(&[104.0, 103.0, 102.0, 101.0], 3);
        assert_relative_eq!(result[3].unwrap(), 0.0);
    }

    #[test]
    fn test_rsi_flat_window() {
        let result = rsi(&[100.0; 6], 3);
        assert_relative_eq!(result[5].unwrap(), 50.0);
    }

    #[test]
    fn test_rsi_known_value() {
        // deltas over window: +2, -1, +1 -> gain 1.0, loss 1/3, rs 3, rsi 75
        let result = rsi(&[100.0, 102.0, 101.0, 102.0], 3);
        assert_relative_eq!(result[3].unwrap(), 75.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rsi_window_slides() {
        // at t = 4 the window is deltas[1..4] = -1, +1, -2
        let result = rsi(&[100.0, 102.0, 101.0, 102.0, 100.0], 3);
        let gain = 1.0 / 3.0;
        let loss = 3.0 / 3.0;
        assert_relative_eq!(
            result[4].unwrap(),
            100.0 - 100.0 / (1.0 + gain / loss),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_roc() {
        let result = roc(&[100.0, 105.0, 110.0], 2);
        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 10.0);
    }

    #[test]
    fn test_roc_zero_base() {
        let result = roc(&[0.0, 1.0], 1);
        assert_eq!(result[1], None);
    }

    #[test]
    fn test_macd_identity() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();
        let macd = Macd::compute(&closes, 12, 26, 9);
        let fast = ema(&closes, 12);
        let slow = ema(&closes, 26);

        assert_relative_eq!(macd.line[0], 0.0);
        assert_relative_eq!(macd.signal[0], 0.0);
        for t in 0..closes.len() {
            assert_relative_eq!(macd.line[t], fast[t] - slow[t], epsilon = 1e-12);
            assert_relative_eq!(macd.histogram[t], macd.line[t] - macd.signal[t], epsilon = 1e-12);
        }
    }
}
