//! Own-shock elasticities from VAR impulse responses

use crate::error::{ForecastError, Result, Stage};
use crate::models::FittedVarModel;
use econ_math::linalg;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default number of impulse-response steps
pub const DEFAULT_IRF_HORIZON: usize = 20;

/// Default shock size the responses are scaled by
pub const DEFAULT_SHOCK_SIZE: f64 = 0.01;

/// How a shock to one variable is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShockConvention {
    /// One standard deviation of the orthogonalised (Cholesky) innovation
    #[default]
    Orthogonalized,
    /// A unit innovation, no covariance scaling
    Unit,
}

/// Sensitivity of a variable to a shock in itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElasticityResult {
    pub variable: String,
    /// Response one step after the shock
    pub short_run: f64,
    /// Cumulative response over the horizon
    pub long_run: f64,
    /// Largest absolute response
    pub max_impact: f64,
    /// Scaled own responses for steps `1..=horizon`
    pub series: Vec<f64>,
    /// The variable had no shock scale, so every response is zero
    pub degenerate: bool,
}

/// Computes elasticities by integrating impulse responses
#[derive(Debug, Clone)]
pub struct ElasticityAnalyzer {
    horizon: usize,
    convention: ShockConvention,
}

impl Default for ElasticityAnalyzer {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_IRF_HORIZON,
            convention: ShockConvention::default(),
        }
    }
}

impl ElasticityAnalyzer {
    /// Create an analyzer over `horizon` response steps
    pub fn new(horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::invalid_parameter(
                Stage::Elasticity,
                "impulse-response horizon must be at least 1",
            ));
        }

        Ok(Self {
            horizon,
            ..Self::default()
        })
    }

    /// Select the shock convention
    pub fn with_convention(mut self, convention: ShockConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Elasticity of `variable` to a shock of `shock_size` in itself
    pub fn analyze(
        &self,
        model: &FittedVarModel,
        variable: &str,
        shock_size: f64,
    ) -> Result<ElasticityResult> {
        if !shock_size.is_finite() {
            return Err(ForecastError::invalid_parameter(
                Stage::Elasticity,
                format!("shock size must be finite, got {}", shock_size),
            ));
        }
        if shock_size == 0.0 {
            return Err(ForecastError::DivisionByZero {
                stage: Stage::Elasticity,
                reason: "shock size is zero".to_string(),
            });
        }
        let target = model
            .variable_index(variable)
            .ok_or_else(|| ForecastError::UnknownVariable {
                stage: Stage::Elasticity,
                name: variable.to_string(),
            })?;

        let impact = self.impact_matrix(model)?;
        if impact[(target, target)] == 0.0 {
            warn!(variable, "variable has no shock scale, elasticity is zero");
            return Ok(ElasticityResult {
                variable: variable.to_string(),
                short_run: 0.0,
                long_run: 0.0,
                max_impact: 0.0,
                series: vec![0.0; self.horizon],
                degenerate: true,
            });
        }

        let series: Vec<f64> = impulse_responses(model, self.horizon)
            .iter()
            .skip(1)
            .map(|phi| (phi * &impact)[(target, target)] / shock_size)
            .collect();

        let short_run = series[0];
        let long_run: f64 = series.iter().sum();
        let max_impact = series.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        debug!(variable, short_run, long_run, max_impact, "elasticity");

        Ok(ElasticityResult {
            variable: variable.to_string(),
            short_run,
            long_run,
            max_impact,
            series,
            degenerate: false,
        })
    }

    fn impact_matrix(&self, model: &FittedVarModel) -> Result<DMatrix<f64>> {
        let k = model.n_variables();
        match self.convention {
            ShockConvention::Unit => Ok(DMatrix::identity(k, k)),
            ShockConvention::Orthogonalized => {
                let factor = linalg::factorize_covariance(model.residual_covariance())
                    .map_err(|e| {
                        ForecastError::invalid_parameter(Stage::Elasticity, e.to_string())
                    })?;
                if factor.used_diagonal_fallback() {
                    warn!("residual covariance is not positive definite, using its diagonal");
                }
                Ok(factor.lower().clone())
            }
        }
    }
}

/// Moving-average matrices `Φ_0 … Φ_horizon` of the VAR
pub fn impulse_responses(model: &FittedVarModel, horizon: usize) -> Vec<DMatrix<f64>> {
    let k = model.n_variables();
    let a = model.coefficients();
    let mut phi: Vec<DMatrix<f64>> = Vec::with_capacity(horizon + 1);
    phi.push(DMatrix::identity(k, k));

    for s in 1..=horizon {
        let mut next = DMatrix::<f64>::zeros(k, k);
        for j in 1..=s.min(a.len()) {
            next += &phi[s - j] * &a[j - 1];
        }
        phi.push(next);
    }

    phi
}
