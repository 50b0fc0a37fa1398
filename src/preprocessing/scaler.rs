//! Standard (z-score) scaling

use crate::error::{Result, ScorecastError};
use serde::{Deserialize, Serialize};

/// Fitted parameters of a standard scaler: (x - center) / scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardParams {
    /// Mean of the training values
    pub center: f64,
    /// Population standard deviation of the training values
    pub scale: f64,
}

impl StandardParams {
    /// Compute mean and population standard deviation.
    ///
    /// A column whose values are all identical has zero deviation and is
    /// reported as a data error rather than scaled by a substitute.
    pub fn fit(column: &str, values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(ScorecastError::DataError(format!(
                "column '{}' has no values to scale",
                column
            )));
        }

        let first = values[0];
        if values.iter().all(|&v| v == first) {
            return Err(ScorecastError::DataError(format!(
                "column '{}' has zero standard deviation (constant value {})",
                column, first
            )));
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        if !std.is_finite() || std <= 0.0 {
            return Err(ScorecastError::DataError(format!(
                "column '{}' has degenerate standard deviation {}",
                column, std
            )));
        }

        Ok(Self { center: mean, scale: std })
    }

    #[inline]
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_std() {
        let params = StandardParams::fit("x", &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((params.center - 5.0).abs() < 1e-12);
        assert!((params.scale - 2.0).abs() < 1e-12);
        assert!((params.transform(7.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_rejected() {
        let err = StandardParams::fit("x", &[3.1, 3.1, 3.1]).unwrap_err();
        assert!(matches!(err, ScorecastError::DataError(_)));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(StandardParams::fit("x", &[]).is_err());
    }
}
