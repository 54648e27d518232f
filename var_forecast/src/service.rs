//! Stateless request-level entry points
//!
//! Each call prepares the caller's series, fits a fresh model and discards
//! it afterwards; nothing is cached between calls.

use crate::config::EngineConfig;
use crate::data::{MultivariateSeries, RawSeries};
use crate::elasticity::ElasticityResult;
use crate::error::Result;
use crate::forecast::{Forecaster, PointForecast};
use crate::models::FittedVarModel;
use crate::risk::{RiskLevel, RiskReport};
use crate::simulation::SimulationEnsemble;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, info_span};

/// Confidence bands, `h × k` each, in model variable order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceIntervals {
    pub variables: Vec<String>,
    pub lower: Vec<Vec<f64>>,
    pub upper: Vec<Vec<f64>>,
    pub mean: Vec<Vec<f64>>,
    pub confidence_level: f64,
    /// Residual covariance was replaced by its diagonal
    pub diagonal_fallback: bool,
    pub seed: u64,
}

impl ConfidenceIntervals {
    fn from_ensemble(variables: &[String], ensemble: SimulationEnsemble) -> Self {
        Self {
            variables: variables.to_vec(),
            lower: ensemble.lower,
            upper: ensemble.upper,
            mean: ensemble.mean,
            confidence_level: ensemble.confidence_level,
            diagonal_fallback: ensemble.diagonal_fallback,
            seed: ensemble.seed,
        }
    }
}

/// Everything one pipeline run produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub lag_order: usize,
    pub n_obs: usize,
    pub forecast: BTreeMap<String, Vec<f64>>,
    pub timestamps: Option<Vec<DateTime<Utc>>>,
    pub confidence_intervals: ConfidenceIntervals,
    pub elasticities: BTreeMap<String, ElasticityResult>,
    pub risk_assessment: RiskReport,
    pub overall_risk: Option<RiskLevel>,
}

/// Forecasting engine facade
#[derive(Debug, Clone, Default)]
pub struct ForecastService {
    config: EngineConfig,
}

impl ForecastService {
    /// Create a service after validating `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clean the series and fit a VAR with AIC-selected lag order
    pub fn fit(&self, raw: &RawSeries) -> Result<(MultivariateSeries, FittedVarModel)> {
        let prepared = self.config.preparer().prepare(raw)?;
        let model = self.config.estimator()?.fit(&prepared)?;
        Ok((prepared, model))
    }

    /// Point forecast per variable
    pub fn forecast(&self, raw: &RawSeries, horizon: usize) -> Result<BTreeMap<String, Vec<f64>>> {
        let (_, model) = self.fit(raw)?;
        Ok(Forecaster::forecast(&model, horizon)?.to_map())
    }

    /// Monte Carlo bands from `n_simulations` trials
    pub fn uncertainty(
        &self,
        raw: &RawSeries,
        horizon: usize,
        n_simulations: usize,
    ) -> Result<ConfidenceIntervals> {
        let (_, model) = self.fit(raw)?;
        let config = EngineConfig {
            n_simulations,
            ..self.config.clone()
        };
        let ensemble = config.simulator()?.simulate(&model, horizon)?;
        Ok(ConfidenceIntervals::from_ensemble(model.variables(), ensemble))
    }

    /// Own-shock elasticity of `variable`
    pub fn elasticity(
        &self,
        raw: &RawSeries,
        variable: &str,
        shock_size: f64,
    ) -> Result<ElasticityResult> {
        let (_, model) = self.fit(raw)?;
        self.config
            .elasticity_analyzer()?
            .analyze(&model, variable, shock_size)
    }

    /// Risk of a forecast against the cleaned history of `raw`
    pub fn risk(
        &self,
        raw: &RawSeries,
        forecast: &PointForecast,
        lower: &[Vec<f64>],
        upper: &[Vec<f64>],
    ) -> Result<RiskReport> {
        let history = self.config.preparer().prepare(raw)?;
        self.config
            .risk_classifier()
            .classify(&history, forecast, lower, upper)
    }

    /// Full pipeline: prepare, fit, forecast, simulate, elasticities, risk.
    ///
    /// Elasticities are computed for `elasticity_variables`, or for every
    /// variable when the slice is empty.
    pub fn run(&self, raw: &RawSeries, elasticity_variables: &[String]) -> Result<ForecastReport> {
        let span = info_span!("forecast_pipeline", rows = raw.len());
        let _guard = span.enter();

        let (prepared, model) = self.fit(raw)?;
        let horizon = self.config.horizon;
        let forecast = Forecaster::forecast(&model, horizon)?;
        let ensemble = self.config.simulator()?.simulate(&model, horizon)?;

        let analyzer = self.config.elasticity_analyzer()?;
        let targets: Vec<String> = if elasticity_variables.is_empty() {
            model.variables().to_vec()
        } else {
            elasticity_variables.to_vec()
        };
        let elasticities = targets
            .iter()
            .map(|name| {
                analyzer
                    .analyze(&model, name, self.config.shock_size)
                    .map(|result| (name.clone(), result))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let risk_assessment = self.config.risk_classifier().classify(
            &prepared,
            &forecast,
            &ensemble.lower,
            &ensemble.upper,
        )?;
        let overall_risk = risk_assessment.overall();
        info!(
            lag_order = model.lag_order(),
            horizon,
            overall_risk = ?overall_risk,
            "forecast pipeline finished"
        );

        Ok(ForecastReport {
            lag_order: model.lag_order(),
            n_obs: model.n_obs(),
            forecast: forecast.to_map(),
            timestamps: forecast.timestamps().map(|t| t.to_vec()),
            confidence_intervals: ConfidenceIntervals::from_ensemble(model.variables(), ensemble),
            elasticities,
            risk_assessment,
            overall_risk,
        })
    }
}
