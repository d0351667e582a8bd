//! Per-column standardization.

use serde::{Deserialize, Serialize};
use signal_core::{Error, Result};
use statrs::statistics::Statistics;

/// Zero-mean, unit-variance scaling fitted on training rows.
///
/// Uses the population standard deviation; a constant column gets scale 1
/// so it maps to zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics on a row-major matrix.
    pub fn fit(x: &[Vec<f64>]) -> Result<Self> {
        let width = matrix_width(x)?;
        let mut mean = Vec::with_capacity(width);
        let mut scale = Vec::with_capacity(width);

        for j in 0..width {
            let column: Vec<f64> = x.iter().map(|row| row[j]).collect();
            let m = column.iter().mean();
            let s = column.iter().population_std_dev();
            if !m.is_finite() || !s.is_finite() {
                return Err(Error::model(format!("column {j} has non-finite statistics")));
            }
            mean.push(m);
            scale.push(if s == 0.0 { 1.0 } else { s });
        }

        Ok(Self { mean, scale })
    }

    /// Number of columns the scaler was fitted on.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Column means.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Column scales.
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Check internal consistency after deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(Error::model(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::model("scaler scales must be finite and positive"));
        }
        Ok(())
    }

    /// Standardize one row.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dim() {
            return Err(Error::model(format!(
                "row has {} features, scaler expects {}",
                row.len(),
                self.dim()
            )));
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Standardize every row.
    pub fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }
}

/// Width of a non-empty, rectangular matrix.
pub(crate) fn matrix_width(x: &[Vec<f64>]) -> Result<usize> {
    let width = x
        .first()
        .map(Vec::len)
        .ok_or_else(|| Error::model("cannot fit on an empty matrix"))?;
    if width == 0 {
        return Err(Error::model("rows have no features"));
    }
    if let Some(i) = x.iter().position(|row| row.len() != width) {
        return Err(Error::model(format!(
            "row {i} has {} features, expected {width}",
            x[i].len()
        )));
    }
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_and_transform() {
        let x = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![5.0, 10.0]];
        let scaler = StandardScaler::fit(&x).unwrap();

        assert_relative_eq!(scaler.mean()[0], 3.0);
        // population std of [1, 3, 5]
        assert_relative_eq!(scaler.scale()[0], (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        // constant column
        assert_relative_eq!(scaler.scale()[1], 1.0);

        let z = scaler.transform(&x).unwrap();
        assert_relative_eq!(z[1][0], 0.0);
        assert_relative_eq!(z[0][1], 0.0);
        assert!(z[0][0] < 0.0 && z[2][0] > 0.0);
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0], vec![2.0, 3.0]]).unwrap();
        assert!(scaler.transform_row(&[1.0]).is_err());
        assert!(StandardScaler::fit(&[vec![1.0, 2.0], vec![2.0]]).is_err());
        assert!(StandardScaler::fit(&[]).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let mut scaler = StandardScaler::fit(&[vec![1.0], vec![2.0]]).unwrap();
        assert!(scaler.validate().is_ok());
        scaler.scale[0] = 0.0;
        assert!(scaler.validate().is_err());
    }
}
