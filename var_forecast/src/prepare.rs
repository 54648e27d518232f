//! Series preparation: outlier removal and gap filling

use crate::data::{MultivariateSeries, RawSeries};
use crate::error::{ForecastError, Result, Stage};
use econ_math::stats;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Multiplier applied to the interquartile range for the outlier fences
pub const IQR_MULTIPLIER: f64 = 1.5;

/// How many outlier-removal passes the preparer runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierPolicy {
    /// One pass over the quartiles of the input
    SinglePass,
    /// Repeat until a pass drops nothing, so cleaned output passes through unchanged
    #[default]
    UntilStable,
}

/// Cleans raw multivariate series before estimation
#[derive(Debug, Clone)]
pub struct SeriesPreparer {
    lag_order: usize,
    policy: OutlierPolicy,
}

impl SeriesPreparer {
    /// Create a preparer that requires at least `lag_order + 1` rows after cleaning
    pub fn new(lag_order: usize) -> Self {
        Self {
            lag_order,
            policy: OutlierPolicy::default(),
        }
    }

    /// Set the outlier policy
    pub fn with_policy(mut self, policy: OutlierPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lag order the cleaned series must support
    pub fn lag_order(&self) -> usize {
        self.lag_order
    }

    /// Remove outlier rows, fill gaps, and check the remaining length
    pub fn prepare(&self, raw: &RawSeries) -> Result<MultivariateSeries> {
        if raw.is_empty() {
            return Err(ForecastError::InsufficientData {
                stage: Stage::Preparation,
                variable: None,
                required: self.lag_order + 1,
                available: 0,
            });
        }

        let mut current = raw.clone();
        loop {
            let keep = outlier_mask(&current)?;
            let dropped = keep.iter().filter(|k| !**k).count();
            if dropped > 0 {
                warn!(
                    dropped,
                    remaining = current.len() - dropped,
                    "dropping outlier rows"
                );
                current = current.retain_rows(&keep);
            }
            if dropped == 0 || self.policy == OutlierPolicy::SinglePass || current.is_empty() {
                break;
            }
        }

        let required = self.lag_order + 1;
        if current.len() < required {
            return Err(ForecastError::InsufficientData {
                stage: Stage::Preparation,
                variable: None,
                required,
                available: current.len(),
            });
        }

        let filled = fill_gaps(&current)?;
        debug!(rows = filled.len(), "series prepared");
        Ok(filled)
    }

    /// Re-run preparation on an already complete series
    pub fn prepare_complete(&self, series: &MultivariateSeries) -> Result<MultivariateSeries> {
        self.prepare(&series.to_raw())
    }
}

/// `true` for every row that lies inside the IQR fences of all its variables.
///
/// Missing cells never flag a row.
fn outlier_mask(raw: &RawSeries) -> Result<Vec<bool>> {
    let mut keep = vec![true; raw.len()];

    for (j, name) in raw.variables().iter().enumerate() {
        let observed = raw.observed_values(j);
        if observed.is_empty() {
            return Err(ForecastError::InsufficientData {
                stage: Stage::Preparation,
                variable: Some(name.clone()),
                required: 1,
                available: 0,
            });
        }

        let (low, high) = stats::iqr_fences(&observed, IQR_MULTIPLIER).map_err(|e| {
            ForecastError::invalid_parameter(Stage::Preparation, format!("'{}': {}", name, e))
        })?;
        for (i, row) in raw.rows().iter().enumerate() {
            if let Some(v) = row[j] {
                if v < low || v > high {
                    debug!(variable = %name, row = i, value = v, low, high, "outlier");
                    keep[i] = false;
                }
            }
        }
    }

    Ok(keep)
}

/// Forward fill, then backward fill any leading gaps
fn fill_gaps(raw: &RawSeries) -> Result<MultivariateSeries> {
    let k = raw.n_variables();
    let mut rows: Vec<Vec<Option<f64>>> = raw.rows().to_vec();

    for j in 0..k {
        let mut last = None;
        for row in rows.iter_mut() {
            match row[j] {
                Some(v) => last = Some(v),
                None => row[j] = last,
            }
        }

        let mut next = None;
        for row in rows.iter_mut().rev() {
            match row[j] {
                Some(v) => next = Some(v),
                None => row[j] = next,
            }
        }

        if rows.iter().any(|row| row[j].is_none()) {
            return Err(ForecastError::InsufficientData {
                stage: Stage::Preparation,
                variable: Some(raw.variables()[j].clone()),
                required: 1,
                available: 0,
            });
        }
    }

    RawSeries::new(raw.variables().to_vec(), raw.timestamps().to_vec(), rows)?.into_complete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{generate_indicators, DEFAULT_INDICATORS};
    use chrono::{Duration, TimeZone, Utc};

    fn raw(columns: Vec<(&str, Vec<Option<f64>>)>) -> RawSeries {
        let n = columns[0].1.len();
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let timestamps: Vec<_> = (0..n).map(|i| start + Duration::days(i as i64)).collect();
        let variables: Vec<String> = columns.iter().map(|(name, _)| name.to_string()).collect();
        let rows: Vec<Vec<Option<f64>>> = (0..n)
            .map(|i| columns.iter().map(|(_, c)| c[i]).collect())
            .collect();
        RawSeries::new(variables, timestamps, rows).unwrap()
    }

    #[test]
    fn test_forward_then_backward_fill() {
        let series = raw(vec![
            ("GDP", vec![None, Some(1.0), None, Some(3.0)]),
            ("Inflation", vec![Some(2.0), None, None, Some(2.5)]),
        ]);
        let prepared = SeriesPreparer::new(1).prepare(&series).unwrap();

        assert_eq!(prepared.column("GDP").unwrap(), vec![1.0, 1.0, 1.0, 3.0]);
        assert_eq!(
            prepared.column("Inflation").unwrap(),
            vec![2.0, 2.0, 2.0, 2.5]
        );
    }

    #[test]
    fn test_drops_entire_row_for_single_outlier() {
        let mut gdp: Vec<Option<f64>> = (0..20).map(|i| Some(i as f64)).collect();
        gdp[10] = Some(500.0);
        let inflation: Vec<Option<f64>> = (0..20).map(|i| Some(2.0 + 0.01 * i as f64)).collect();
        let series = raw(vec![("GDP", gdp), ("Inflation", inflation)]);

        let prepared = SeriesPreparer::new(1).prepare(&series).unwrap();
        assert_eq!(prepared.len(), 19);
        assert!(prepared.column("GDP").unwrap().iter().all(|v| *v < 100.0));
    }

    #[test]
    fn test_variable_without_observations_is_named() {
        let series = raw(vec![
            ("GDP", vec![Some(1.0), Some(2.0)]),
            ("Inflation", vec![None, None]),
        ]);
        let err = SeriesPreparer::new(1).prepare(&series).unwrap_err();
        assert_eq!(err.variable(), Some("Inflation"));
        assert_eq!(err.stage(), Stage::Preparation);
    }

    #[test]
    fn test_insufficient_rows_after_cleaning() {
        let series = raw(vec![("GDP", vec![Some(1.0), Some(2.0), Some(3.0)])]);
        let err = SeriesPreparer::new(5).prepare(&series).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData {
                required: 6,
                available: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_until_stable_is_idempotent() {
        // Removing the largest value shrinks the IQR and exposes a new outlier
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 17.0, 1000.0];
        let series = raw(vec![("GDP", values.into_iter().map(Some).collect())]);

        let single = SeriesPreparer::new(1)
            .with_policy(OutlierPolicy::SinglePass)
            .prepare(&series)
            .unwrap();
        assert_eq!(single.len(), 11);

        let preparer = SeriesPreparer::new(1);
        let once = preparer.prepare(&series).unwrap();
        assert_eq!(once.len(), 10);
        let twice = preparer.prepare_complete(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_default_preparer_is_idempotent_on_trending_indicators() {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let preparer = SeriesPreparer::new(5);

        for seed in [0, 1, 7, 42] {
            let history = generate_indicators(&DEFAULT_INDICATORS, start, 48, seed).unwrap();
            let once = preparer.prepare_complete(&history).unwrap();
            let twice = preparer.prepare_complete(&once).unwrap();
            assert_eq!(once, twice, "seed {}", seed);
        }
    }
}
