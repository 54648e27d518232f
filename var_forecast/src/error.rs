//! Error types for the var_forecast crate

use econ_math::MathError;
use polars::prelude::PolarsError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Loading or constructing a series
    Ingestion,
    /// Outlier removal and gap filling
    Preparation,
    /// Lag selection and least-squares fitting
    Estimation,
    /// Deterministic forecasting
    Forecasting,
    /// Monte Carlo uncertainty simulation
    Simulation,
    /// Impulse-response elasticity analysis
    Elasticity,
    /// Forecast risk classification
    RiskClassification,
    /// Shock scenario generation
    Scenario,
    /// Configuration loading and validation
    Configuration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingestion => "ingestion",
            Stage::Preparation => "preparation",
            Stage::Estimation => "estimation",
            Stage::Forecasting => "forecasting",
            Stage::Simulation => "simulation",
            Stage::Elasticity => "elasticity",
            Stage::RiskClassification => "risk classification",
            Stage::Scenario => "scenario",
            Stage::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Custom error types for the var_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The series violates its schema (names, ordering, shape)
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// Fewer observations than the requested computation needs
    #[error("Insufficient data during {stage}{}: need {required} observations, have {available}", fmt_variable(.variable))]
    InsufficientData {
        stage: Stage,
        variable: Option<String>,
        required: usize,
        available: usize,
    },

    /// Singular or ill-conditioned regression
    #[error("Estimation failed for VAR({lag_order}){}: {reason}", fmt_variable(.variable))]
    Estimation {
        lag_order: usize,
        variable: Option<String>,
        reason: String,
    },

    /// A variable name that is not part of the model or series
    #[error("Unknown variable during {stage}: {name}")]
    UnknownVariable { stage: Stage, name: String },

    /// A computation would divide by zero
    #[error("Division by zero during {stage}: {reason}")]
    DivisionByZero { stage: Stage, reason: String },

    /// Error from invalid parameters
    #[error("Invalid parameter during {stage}: {reason}")]
    InvalidParameter { stage: Stage, reason: String },

    /// Inputs whose dimensions do not line up
    #[error("Shape mismatch during {stage}: {reason}")]
    ShapeMismatch { stage: Stage, reason: String },

    /// Error from mathematical operations
    #[error("Math error during {stage}: {source}")]
    Math {
        stage: Stage,
        #[source]
        source: MathError,
    },

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// A timestamp that could not be parsed
    #[error("Timestamp parse error: {0}")]
    TimestampParse(String),
}

fn fmt_variable(variable: &Option<String>) -> String {
    match variable {
        Some(name) => format!(" (variable '{}')", name),
        None => String::new(),
    }
}

impl ForecastError {
    /// Pipeline stage the error originated from
    pub fn stage(&self) -> Stage {
        match self {
            ForecastError::InsufficientData { stage, .. }
            | ForecastError::UnknownVariable { stage, .. }
            | ForecastError::DivisionByZero { stage, .. }
            | ForecastError::InvalidParameter { stage, .. }
            | ForecastError::ShapeMismatch { stage, .. }
            | ForecastError::Math { stage, .. } => *stage,
            ForecastError::Estimation { .. } => Stage::Estimation,
            ForecastError::Json(_) => Stage::Configuration,
            ForecastError::InvalidSeries(_)
            | ForecastError::IoError(_)
            | ForecastError::Csv(_)
            | ForecastError::PolarsError(_)
            | ForecastError::TimestampParse(_) => Stage::Ingestion,
        }
    }

    /// Variable the error is attributed to, when one is known
    pub fn variable(&self) -> Option<&str> {
        match self {
            ForecastError::InsufficientData { variable, .. }
            | ForecastError::Estimation { variable, .. } => variable.as_deref(),
            ForecastError::UnknownVariable { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Attribute a math helper failure to `stage`, for use with `map_err`
    pub fn math(stage: Stage) -> impl Fn(MathError) -> Self {
        move |source| ForecastError::Math { stage, source }
    }

    pub(crate) fn invalid_parameter(stage: Stage, reason: impl Into<String>) -> Self {
        ForecastError::InvalidParameter {
            stage,
            reason: reason.into(),
        }
    }

    pub(crate) fn shape_mismatch(stage: Stage, reason: impl Into<String>) -> Self {
        ForecastError::ShapeMismatch {
            stage,
            reason: reason.into(),
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
