//! Descriptive statistics
//!
//! Contains the sample statistics used across the forecasting engine:
//! - Mean and sample standard deviation
//! - Quantiles with linear interpolation between order statistics
//! - Interquartile fences for outlier screening

use crate::{MathError, Result};

/// Arithmetic mean of the values
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot calculate mean of an empty slice".to_string(),
        ));
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_std_dev(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(format!(
            "Sample standard deviation needs at least 2 values, have {}",
            values.len()
        )));
    }

    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|&v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;

    Ok(variance.sqrt())
}

/// Quantile `q` in `[0, 1]` of an already sorted slice.
///
/// Uses linear interpolation between the two closest order statistics, so
/// `q = 0.25` on `[1, 2, 3, 4]` yields `1.75`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Result<f64> {
    if sorted.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot calculate quantile of an empty slice".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Quantile must be between 0 and 1, got {}",
            q
        )));
    }

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Quantile `q` in `[0, 1]` of unsorted values
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.iter().any(|v| v.is_nan()) {
        return Err(MathError::InvalidInput(
            "Cannot calculate quantile of values containing NaN".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

/// Tukey fences `[Q1 - k·IQR, Q3 + k·IQR]`
pub fn iqr_fences(values: &[f64], multiplier: f64) -> Result<(f64, f64)> {
    if multiplier < 0.0 {
        return Err(MathError::InvalidInput(
            "IQR multiplier cannot be negative".to_string(),
        ));
    }

    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;

    Ok((q1 - multiplier * iqr, q3 + multiplier * iqr))
}
