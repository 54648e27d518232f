//! Vector autoregression (VAR) estimation with AIC lag selection

use crate::data::MultivariateSeries;
use crate::error::{ForecastError, Result, Stage};
use crate::forecast::{Forecaster, PointForecast};
use crate::models::{ForecastModel, TrainedForecastModel};
use crate::utils::Frequency;
use chrono::{DateTime, Utc};
use econ_math::linalg;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default maximum lag order tried during selection
pub const DEFAULT_MAXLAGS: usize = 5;

/// Information criterion of one candidate lag order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagCandidate {
    /// Lag order `p`
    pub lag_order: usize,
    /// Akaike information criterion; `None` when the residual covariance is singular
    pub aic: Option<f64>,
    /// Observations in the estimation sample
    pub n_obs: usize,
}

/// Pick the lag order with the lowest AIC.
///
/// Candidates without an AIC are skipped; ties go to the smaller lag order.
pub fn select_lag_order(candidates: &[LagCandidate]) -> Option<usize> {
    candidates
        .iter()
        .filter_map(|c| c.aic.map(|aic| (c.lag_order, aic)))
        .fold(None, |best: Option<(usize, f64)>, (p, aic)| match best {
            Some((best_p, best_aic)) if best_aic < aic || (best_aic == aic && best_p < p) => best,
            _ => Some((p, aic)),
        })
        .map(|(p, _)| p)
}

/// VAR model estimator
#[derive(Debug, Clone)]
pub struct VarEstimator {
    /// Name of the model
    name: String,
    /// Largest lag order considered
    maxlags: usize,
}

/// Fitted VAR(p) model.
///
/// `y(t) = c + A_1·y(t-1) + … + A_p·y(t-p) + u(t)` with `u ~ N(0, Σ_u)`.
#[derive(Debug, Clone)]
pub struct FittedVarModel {
    lag_order: usize,
    variables: Vec<String>,
    coefficients: Vec<DMatrix<f64>>,
    intercept: DVector<f64>,
    residual_covariance: DMatrix<f64>,
    /// Last `p` observations, oldest first
    warm_start: Vec<DVector<f64>>,
    n_obs: usize,
    lag_candidates: Vec<LagCandidate>,
    last_timestamp: Option<DateTime<Utc>>,
    frequency: Option<Frequency>,
}

/// Least-squares fit of one lag order on a chosen sample
struct OlsFit {
    coefficients: Vec<DMatrix<f64>>,
    intercept: DVector<f64>,
    ssr: DMatrix<f64>,
    n_obs: usize,
    n_regressors: usize,
}

impl OlsFit {
    fn aic(&self, lag_order: usize) -> Option<f64> {
        let k = self.intercept.len();
        let sigma_mle = &self.ssr / self.n_obs as f64;
        let free_params = (lag_order * k * k + k) as f64;
        linalg::log_det_spd(&sigma_mle)
            .ok()
            .map(|log_det| log_det + 2.0 * free_params / self.n_obs as f64)
    }

    fn residual_covariance(&self) -> DMatrix<f64> {
        &self.ssr / (self.n_obs - self.n_regressors) as f64
    }
}

impl Default for VarEstimator {
    fn default() -> Self {
        Self {
            name: format!("VAR(maxlags={})", DEFAULT_MAXLAGS),
            maxlags: DEFAULT_MAXLAGS,
        }
    }
}

impl VarEstimator {
    /// Create a new estimator that selects a lag order in `1..=maxlags`
    pub fn new(maxlags: usize) -> Result<Self> {
        if maxlags == 0 {
            return Err(ForecastError::invalid_parameter(
                Stage::Estimation,
                "maxlags must be at least 1",
            ));
        }

        Ok(Self {
            name: format!("VAR(maxlags={})", maxlags),
            maxlags,
        })
    }

    /// Largest lag order considered
    pub fn maxlags(&self) -> usize {
        self.maxlags
    }

    /// AIC for every lag order in `1..=maxlags`, all on the same sample.
    ///
    /// The first `maxlags` rows serve as pre-sample values for every
    /// candidate, so the criteria are comparable.
    pub fn lag_candidates(&self, series: &MultivariateSeries) -> Result<Vec<LagCandidate>> {
        (1..=self.maxlags)
            .map(|p| {
                let fit = ols_fit(series, p, self.maxlags)?;
                let aic = fit.aic(p);
                match aic {
                    Some(value) => debug!(lag_order = p, aic = value, "lag candidate"),
                    None => warn!(lag_order = p, "singular residual covariance, AIC undefined"),
                }
                Ok(LagCandidate {
                    lag_order: p,
                    aic,
                    n_obs: fit.n_obs,
                })
            })
            .collect()
    }

    /// Select the lag order by AIC and refit it on the full sample
    pub fn fit(&self, series: &MultivariateSeries) -> Result<FittedVarModel> {
        let candidates = self.lag_candidates(series)?;
        let lag_order = select_lag_order(&candidates).ok_or_else(|| ForecastError::Estimation {
            lag_order: self.maxlags,
            variable: None,
            reason: "residual covariance is singular for every candidate lag order".to_string(),
        })?;
        info!(lag_order, maxlags = self.maxlags, "selected VAR lag order by AIC");

        let mut model = self.fit_order(series, lag_order)?;
        model.lag_candidates = candidates;
        Ok(model)
    }

    /// Fit a fixed lag order on the full sample, without selection
    pub fn fit_order(
        &self,
        series: &MultivariateSeries,
        lag_order: usize,
    ) -> Result<FittedVarModel> {
        if lag_order == 0 {
            return Err(ForecastError::invalid_parameter(
                Stage::Estimation,
                "lag order must be at least 1",
            ));
        }

        let fit = ols_fit(series, lag_order, lag_order)?;
        let warm_start = series
            .last_rows(lag_order)
            .iter()
            .map(|row| DVector::from_column_slice(row))
            .collect();

        Ok(FittedVarModel {
            lag_order,
            variables: series.variables().to_vec(),
            residual_covariance: fit.residual_covariance(),
            coefficients: fit.coefficients,
            intercept: fit.intercept,
            warm_start,
            n_obs: fit.n_obs,
            lag_candidates: Vec::new(),
            last_timestamp: series.timestamps().last().copied(),
            frequency: Frequency::infer(series.timestamps()),
        })
    }
}

/// Multivariate least squares of `y(t)` on `[1, y(t-1), …, y(t-p)]` for `t >= start`
fn ols_fit(series: &MultivariateSeries, lag_order: usize, start: usize) -> Result<OlsFit> {
    let rows = series.rows();
    let k = series.n_variables();
    let n_regressors = 1 + k * lag_order;
    let n_obs = rows.len().saturating_sub(start);

    if n_obs <= n_regressors {
        return Err(ForecastError::Estimation {
            lag_order,
            variable: None,
            reason: format!(
                "{} observations cannot identify {} parameters per equation",
                n_obs, n_regressors
            ),
        });
    }

    // A variable that never moves makes its lag columns collinear with the intercept
    for (j, name) in series.variables().iter().enumerate() {
        let window = &rows[start - lag_order..];
        if window.iter().all(|row| row[j] == window[0][j]) {
            return Err(ForecastError::Estimation {
                lag_order,
                variable: Some(name.clone()),
                reason: "variable is constant over the estimation sample".to_string(),
            });
        }
    }

    let x = DMatrix::from_fn(n_obs, n_regressors, |r, c| {
        if c == 0 {
            1.0
        } else {
            let lag = (c - 1) / k + 1;
            rows[start + r - lag][(c - 1) % k]
        }
    });
    let y = DMatrix::from_fn(n_obs, k, |r, c| rows[start + r][c]);

    let svd = x.clone().svd(true, true);
    let tolerance =
        svd.singular_values.max() * n_obs.max(n_regressors) as f64 * f64::EPSILON;
    let rank = svd.rank(tolerance);
    if rank < n_regressors {
        return Err(ForecastError::Estimation {
            lag_order,
            variable: None,
            reason: format!(
                "design matrix is rank-deficient (rank {} < {})",
                rank, n_regressors
            ),
        });
    }

    let beta = svd
        .solve(&y, tolerance)
        .map_err(|reason| ForecastError::Estimation {
            lag_order,
            variable: None,
            reason: reason.to_string(),
        })?;

    let residuals = &y - &x * &beta;
    let ssr = residuals.transpose() * &residuals;

    let intercept = DVector::from_fn(k, |eq, _| beta[(0, eq)]);
    let coefficients = (0..lag_order)
        .map(|i| DMatrix::from_fn(k, k, |eq, var| beta[(1 + i * k + var, eq)]))
        .collect();

    Ok(OlsFit {
        coefficients,
        intercept,
        ssr,
        n_obs,
        n_regressors,
    })
}

impl FittedVarModel {
    /// Assemble a model from known parameters.
    ///
    /// `warm_start` holds the last `p` observations, oldest first.
    pub fn from_parts(
        variables: Vec<String>,
        coefficients: Vec<DMatrix<f64>>,
        intercept: DVector<f64>,
        residual_covariance: DMatrix<f64>,
        warm_start: Vec<DVector<f64>>,
    ) -> Result<Self> {
        let k = variables.len();
        let lag_order = coefficients.len();
        let shape_error = |reason: String| ForecastError::shape_mismatch(Stage::Estimation, reason);

        if k == 0 || lag_order == 0 {
            return Err(shape_error(
                "a VAR needs at least one variable and one lag".to_string(),
            ));
        }
        if let Some(i) = coefficients.iter().position(|a| a.shape() != (k, k)) {
            return Err(shape_error(format!(
                "coefficient matrix {} is not {}x{}",
                i + 1,
                k,
                k
            )));
        }
        if intercept.len() != k || residual_covariance.shape() != (k, k) {
            return Err(shape_error(format!(
                "intercept and residual covariance must have dimension {}",
                k
            )));
        }
        if warm_start.len() != lag_order || warm_start.iter().any(|v| v.len() != k) {
            return Err(shape_error(format!(
                "warm start must hold {} vectors of length {}",
                lag_order, k
            )));
        }

        Ok(Self {
            lag_order,
            variables,
            coefficients,
            intercept,
            residual_covariance,
            warm_start,
            n_obs: 0,
            lag_candidates: Vec::new(),
            last_timestamp: None,
            frequency: None,
        })
    }

    /// Lag order `p`
    pub fn lag_order(&self) -> usize {
        self.lag_order
    }

    /// Variable names, in model order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Number of variables `k`
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Position of a variable in the model
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    /// Coefficient matrices `A_1 … A_p`
    pub fn coefficients(&self) -> &[DMatrix<f64>] {
        &self.coefficients
    }

    /// Intercept vector `c`
    pub fn intercept(&self) -> &DVector<f64> {
        &self.intercept
    }

    /// Residual covariance `Σ_u`
    pub fn residual_covariance(&self) -> &DMatrix<f64> {
        &self.residual_covariance
    }

    /// Last `p` observations, oldest first
    pub fn warm_start(&self) -> &[DVector<f64>] {
        &self.warm_start
    }

    /// Observations used in the final fit (0 for assembled models)
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// Information criteria of the candidate lag orders
    pub fn lag_candidates(&self) -> &[LagCandidate] {
        &self.lag_candidates
    }

    /// Timestamp of the last observation used
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Sampling frequency inferred from the training series
    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }

    /// Conditional mean of the next observation given `history` (newest last)
    pub(crate) fn next_mean(&self, history: &[DVector<f64>]) -> DVector<f64> {
        let mut next = self.intercept.clone();
        for (i, a) in self.coefficients.iter().enumerate() {
            next += a * &history[history.len() - 1 - i];
        }
        next
    }
}

impl ForecastModel for VarEstimator {
    type Trained = FittedVarModel;

    fn train(&self, data: &MultivariateSeries) -> Result<FittedVarModel> {
        self.fit(data)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedForecastModel for FittedVarModel {
    fn forecast(&self, horizons: usize) -> Result<PointForecast> {
        Forecaster::forecast(self, horizons)
    }

    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn name(&self) -> String {
        format!("VAR({})", self.lag_order)
    }
}
