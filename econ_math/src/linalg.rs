//! Dense linear algebra helpers
//!
//! Contains the matrix routines shared by the estimator and the simulators:
//! - Covariance factorization (Cholesky, with a diagonal fallback)
//! - Log-determinant of symmetric positive-definite matrices
//! - Frobenius distance between matrices

use crate::{MathError, Result};
use nalgebra::{DMatrix, DVector};

/// Tolerance used when checking a covariance matrix for symmetry
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Factor `L` of a covariance matrix `Σ` such that `L·Lᵀ ≈ Σ`.
///
/// When `Σ` is positive definite, `L` is its lower Cholesky factor. Otherwise
/// `L` is the diagonal matrix of the (non-negative) standard deviations, which
/// ignores every cross-covariance. [`CovarianceFactor::used_diagonal_fallback`]
/// reports which of the two was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceFactor {
    lower: DMatrix<f64>,
    diagonal_fallback: bool,
}

impl CovarianceFactor {
    /// Get the lower triangular factor
    pub fn lower(&self) -> &DMatrix<f64> {
        &self.lower
    }

    /// Whether the diagonal approximation replaced the Cholesky factor
    pub fn used_diagonal_fallback(&self) -> bool {
        self.diagonal_fallback
    }

    /// Dimension of the factored covariance
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Map independent standard normals `z` to correlated draws `L·z`
    pub fn transform(&self, z: &[f64]) -> Result<Vec<f64>> {
        if z.len() != self.dim() {
            return Err(MathError::InvalidInput(format!(
                "Expected {} standard normal draws, got {}",
                self.dim(),
                z.len()
            )));
        }

        let draws = &self.lower * DVector::from_column_slice(z);
        Ok(draws.iter().copied().collect())
    }
}

fn validate_covariance(cov: &DMatrix<f64>) -> Result<()> {
    if !cov.is_square() || cov.nrows() == 0 {
        return Err(MathError::InvalidInput(format!(
            "Covariance matrix must be square and non-empty, got {}x{}",
            cov.nrows(),
            cov.ncols()
        )));
    }
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Covariance matrix contains non-finite values".to_string(),
        ));
    }

    let n = cov.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let scale = cov[(i, j)].abs().max(cov[(j, i)].abs()).max(1.0);
            if (cov[(i, j)] - cov[(j, i)]).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(MathError::InvalidInput(format!(
                    "Covariance matrix is not symmetric at ({}, {})",
                    i, j
                )));
            }
        }
    }

    Ok(())
}

/// Factor a covariance matrix for correlated sampling.
///
/// Fails only when the input is not a finite symmetric square matrix; a
/// matrix that is merely not positive definite yields the diagonal fallback.
pub fn factorize_covariance(cov: &DMatrix<f64>) -> Result<CovarianceFactor> {
    validate_covariance(cov)?;

    if let Some(cholesky) = cov.clone().cholesky() {
        return Ok(CovarianceFactor {
            lower: cholesky.l(),
            diagonal_fallback: false,
        });
    }

    let std_devs = DVector::from_iterator(
        cov.nrows(),
        cov.diagonal().iter().map(|&v| v.max(0.0).sqrt()),
    );

    Ok(CovarianceFactor {
        lower: DMatrix::from_diagonal(&std_devs),
        diagonal_fallback: true,
    })
}

/// Natural log of the determinant of a symmetric positive-definite matrix
pub fn log_det_spd(matrix: &DMatrix<f64>) -> Result<f64> {
    validate_covariance(matrix)?;

    let cholesky = matrix.clone().cholesky().ok_or_else(|| {
        MathError::CalculationError("Matrix is not positive definite".to_string())
    })?;
    let l = cholesky.l();

    Ok(2.0 * l.diagonal().iter().map(|d| d.ln()).sum::<f64>())
}

/// Frobenius norm of `a - b`
pub fn frobenius_distance(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<f64> {
    if a.shape() != b.shape() {
        return Err(MathError::InvalidInput(format!(
            "Matrix shapes differ: {:?} vs {:?}",
            a.shape(),
            b.shape()
        )));
    }

    Ok((a - b).norm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cholesky_factor_reconstructs_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let factor = factorize_covariance(&cov).unwrap();

        assert!(!factor.used_diagonal_fallback());
        let rebuilt = factor.lower() * factor.lower().transpose();
        assert_relative_eq!(rebuilt, cov, epsilon = 1e-12);
        assert_relative_eq!(factor.lower()[(0, 1)], 0.0);
    }

    #[test]
    fn test_singular_covariance_falls_back_to_diagonal() {
        // Perfectly correlated, so only positive semi-definite
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let factor = factorize_covariance(&cov).unwrap();

        assert!(factor.used_diagonal_fallback());
        assert_relative_eq!(factor.lower()[(0, 0)], 1.0);
        assert_relative_eq!(factor.lower()[(1, 1)], 1.0);
        assert_relative_eq!(factor.lower()[(1, 0)], 0.0);
    }

    #[test]
    fn test_transform_applies_lower_factor() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let factor = factorize_covariance(&cov).unwrap();
        let draws = factor.transform(&[1.0, 0.0]).unwrap();

        // First column of L is (2, 1)
        assert_relative_eq!(draws[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(draws[1], 1.0, epsilon = 1e-12);
        assert!(factor.transform(&[1.0]).is_err());
    }

    #[test]
    fn test_rejects_asymmetric_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.1, 1.0]);
        assert!(matches!(
            factorize_covariance(&cov),
            Err(MathError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_log_det() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        assert_relative_eq!(log_det_spd(&m).unwrap(), 8.0_f64.ln(), epsilon = 1e-12);

        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(matches!(
            log_det_spd(&singular),
            Err(MathError::CalculationError(_))
        ));
    }

    #[test]
    fn test_frobenius_distance() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 4.0, 1.0]);
        assert_relative_eq!(frobenius_distance(&a, &b).unwrap(), 5.0);
        assert!(frobenius_distance(&a, &DMatrix::zeros(3, 3)).is_err());
    }
}
