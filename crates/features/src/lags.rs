//! Lagged values and period-over-period changes.

use crate::{finite, Series};

/// `x[t - k]`, undefined for `t < k`.
pub fn lag(values: &[f64], k: usize) -> Series {
    (0..values.len())
        .map(|t| t.checked_sub(k).and_then(|i| finite(values[i])))
        .collect()
}

/// Percent change from the previous value: (x[t] - x[t - 1]) / x[t - 1] * 100.
pub fn pct_change(values: &[f64]) -> Series {
    (0..values.len())
        .map(|t| {
            let prev = *values.get(t.checked_sub(1)?)?;
            if prev == 0.0 {
                return None;
            }
            finite((values[t] - prev) / prev * 100.0)
        })
        .collect()
}

/// Elementwise ratio, undefined where either side is undefined or the denominator is zero.
pub fn ratio(numerator: &[f64], denominator: &Series) -> Series {
    numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| match d {
            Some(d) if *d != 0.0 => finite(n / d),
            _ => None,
        })
        .collect()
}
