//! # Econ Math
//!
//! Numeric building blocks for macroeconomic time series models.
//! This crate provides the descriptive statistics and the small amount of
//! dense linear algebra that the forecasting engine needs, without any I/O.

use thiserror::Error;

pub mod linalg;
pub mod stats;

/// Errors that can occur in statistical and matrix calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for econ math operations
pub type Result<T> = std::result::Result<T, MathError>;

pub use linalg::{factorize_covariance, log_det_spd, CovarianceFactor};
pub use stats::{mean, quantile, sample_std_dev};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MathError::InsufficientData("need 2 values, have 1".to_string());
        assert_eq!(
            err.to_string(),
            "Insufficient data for calculation: need 2 values, have 1"
        );
    }
}
