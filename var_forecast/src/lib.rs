//! # VAR Forecast
//!
//! A Rust library for forecasting macroeconomic indicators with vector
//! autoregressions.
//!
//! ## Features
//!
//! - Multivariate series handling (CSV, polars DataFrames, indicator records)
//! - Outlier screening and gap filling before estimation
//! - VAR estimation with AIC lag selection
//! - Point forecasts and Monte Carlo confidence bands
//! - Own-shock elasticities from impulse responses
//! - Forecast risk classification and shock scenarios
//!
//! ## Pipeline
//!
//! raw series → [`SeriesPreparer`] → [`VarEstimator`] → fitted model, which feeds
//! [`Forecaster`], [`UncertaintySimulator`] and [`ElasticityAnalyzer`]; the
//! forecast, history and bands then go to [`RiskClassifier`].
//! [`ForecastService`] runs the whole chain from one [`EngineConfig`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use var_forecast::{DataLoader, EngineConfig, ForecastService};
//!
//! fn main() -> Result<(), var_forecast::ForecastError> {
//!     // Wide CSV: timestamp column first, one column per indicator
//!     let raw = DataLoader::from_csv("indicators.csv")?;
//!
//!     let service = ForecastService::new(EngineConfig::default())?;
//!     let report = service.run(&raw, &[])?;
//!
//!     println!("VAR({}) over {} observations", report.lag_order, report.n_obs);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod elasticity;
pub mod error;
pub mod forecast;
pub mod models;
pub mod prepare;
pub mod risk;
pub mod sample;
pub mod scenario;
pub mod service;
pub mod simulation;
pub mod utils;

// Re-export commonly used types
pub use crate::config::EngineConfig;
pub use crate::data::{DataLoader, IndicatorObservation, MultivariateSeries, RawSeries};
pub use crate::elasticity::{ElasticityAnalyzer, ElasticityResult, ShockConvention};
pub use crate::error::{ForecastError, Result, Stage};
pub use crate::forecast::{Forecaster, PointForecast};
pub use crate::models::{
    select_lag_order, FittedVarModel, ForecastModel, LagCandidate, TrainedForecastModel,
    VarEstimator,
};
pub use crate::prepare::{OutlierPolicy, SeriesPreparer};
pub use crate::risk::{RiskClassifier, RiskLevel, RiskReport, RiskThresholds, VariableRisk};
pub use crate::scenario::{assess_scenario, ScenarioAssessment, ScenarioOutcome, ShockScenario};
pub use crate::service::{ConfidenceIntervals, ForecastReport, ForecastService};
pub use crate::simulation::{NoiseModel, SimulationEnsemble, UncertaintySimulator};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
