//! Simple and exponential moving averages.

use crate::{finite, Series};

/// Simple moving average over the trailing `window` values, current value included.
///
/// Undefined for the first `window - 1` positions.
pub fn sma(values: &[f64], window: usize) -> Series {
    let mut result = vec![None; values.len()];
    if window == 0 {
        return result;
    }

    for t in (window - 1)..values.len() {
        let sum: f64 = values[t + 1 - window..=t].iter().sum();
        result[t] = finite(sum / window as f64);
    }
    result
}

/// Smoothing factor for an EMA span.
#[inline]
pub fn ema_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Exponential moving average seeded with the first value.
///
/// `ema[0] = x[0]`, `ema[t] = a * x[t] + (1 - a) * ema[t - 1]` with `a = 2 / (span + 1)`.
/// Defined from the first position onward.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = ema_alpha(span);
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &x in values {
        let next = match prev {
            Some(p) => alpha * x + (1.0 - alpha) * p,
            None => x,
        };
        result.push(next);
        prev = Some(next);
    }
    result
}
