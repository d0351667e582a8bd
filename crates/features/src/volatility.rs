//! Rolling standard deviation and Bollinger bands.

use signal_core::config::StdDevKind;
use statrs::statistics::Statistics;

use crate::{finite, Series};

/// Standard deviation of the trailing `window` values, current value included.
///
/// Undefined for the first `window - 1` positions. The same estimator must be
/// used everywhere a dataset is built, so it is always passed explicitly.
pub fn rolling_std(values: &[f64], window: usize, kind: StdDevKind) -> Series {
    let mut result = vec![None; values.len()];
    if window < 2 {
        return result;
    }

    for t in (window - 1)..values.len() {
        let slice = &values[t + 1 - window..=t];
        let std = match kind {
            StdDevKind::Sample => slice.iter().std_dev(),
            StdDevKind::Population => slice.iter().population_std_dev(),
        };
        result[t] = finite(std);
    }
    result
}

/// Bollinger bands around a simple moving average.
#[derive(Debug, Clone)]
pub struct Bollinger {
    /// SMA(window).
    pub middle: Series,
    /// Rolling standard deviation.
    pub std: Series,
    /// middle + k * std.
    pub upper: Series,
    /// middle - k * std.
    pub lower: Series,
    /// upper - lower.
    pub width: Series,
}

impl Bollinger {
    /// Compute bands over `window` values with `k` standard deviations.
    pub fn compute(values: &[f64], window: usize, k: f64, kind: StdDevKind) -> Self {
        let middle = crate::moving_average::sma(values, window);
        let std = rolling_std(values, window, kind);

        let band = |sign: f64| -> Series {
            middle
                .iter()
                .zip(&std)
                .map(|(m, s)| match (m, s) {
                    (Some(m), Some(s)) => finite(m + sign * k * s),
                    _ => None,
                })
                .collect()
        };
        let upper = band(1.0);
        let lower = band(-1.0);
        let width = upper
            .iter()
            .zip(&lower)
            .map(|(u, l)| match (u, l) {
                (Some(u), Some(l)) => finite(u - l),
                _ => None,
            })
            .collect();

        Self {
            middle,
            std,
            upper,
            lower,
            width,
        }
    }
}
