//! Forecast risk classification
//!
//! A forecast is risky when it moves much more than the history did, or when
//! its confidence band is wide relative to historical volatility.

use crate::data::MultivariateSeries;
use crate::error::{ForecastError, Result, Stage};
use crate::forecast::PointForecast;
use econ_math::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Categorical forecast risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        f.pad(name)
    }
}

/// Risk assessment of one variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableRisk {
    pub level: RiskLevel,
    /// Forecast over historical standard deviation; `None` when the history is flat
    pub volatility_ratio: Option<f64>,
    /// Mean width of the confidence band
    pub confidence_width: f64,
}

/// Risk assessment per variable
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RiskReport {
    variables: BTreeMap<String, VariableRisk>,
}

impl RiskReport {
    /// Assessment of one variable
    pub fn get(&self, variable: &str) -> Option<&VariableRisk> {
        self.variables.get(variable)
    }

    /// Highest level across all variables
    pub fn overall(&self) -> Option<RiskLevel> {
        self.variables.values().map(|r| r.level).max()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariableRisk)> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Cut-offs between the risk levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub high_ratio: f64,
    pub medium_ratio: f64,
    /// Band width cut-off, in multiples of the historical standard deviation
    pub high_width: f64,
    pub medium_width: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_ratio: 1.5,
            medium_ratio: 1.2,
            high_width: 2.0,
            medium_width: 1.5,
        }
    }
}

/// Maps forecast volatility and band width to a [`RiskLevel`]
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    thresholds: RiskThresholds,
}

impl RiskClassifier {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify every variable of `forecast` against its history.
    ///
    /// `lower` and `upper` are `h × k` bands aligned with the forecast.
    pub fn classify(
        &self,
        history: &MultivariateSeries,
        forecast: &PointForecast,
        lower: &[Vec<f64>],
        upper: &[Vec<f64>],
    ) -> Result<RiskReport> {
        let horizon = forecast.horizon();
        let k = forecast.variables().len();
        let aligned =
            |band: &[Vec<f64>]| band.len() == horizon && band.iter().all(|s| s.len() == k);
        if !aligned(lower) || !aligned(upper) {
            return Err(ForecastError::shape_mismatch(
                Stage::RiskClassification,
                format!("confidence bands must be {}x{} like the forecast", horizon, k),
            ));
        }

        let mut variables = BTreeMap::new();
        for (j, name) in forecast.variables().iter().enumerate() {
            let hist_index =
                history
                    .variable_index(name)
                    .ok_or_else(|| ForecastError::UnknownVariable {
                        stage: Stage::RiskClassification,
                        name: name.clone(),
                    })?;
            let column_lower: Vec<f64> = lower.iter().map(|s| s[j]).collect();
            let column_upper: Vec<f64> = upper.iter().map(|s| s[j]).collect();

            let risk = self
                .classify_variable(
                    &history.column_at(hist_index),
                    &forecast.column_at(j),
                    &column_lower,
                    &column_upper,
                )
                .map_err(|e| match e {
                    ForecastError::InsufficientData {
                        stage,
                        required,
                        available,
                        ..
                    } => ForecastError::InsufficientData {
                        stage,
                        variable: Some(name.clone()),
                        required,
                        available,
                    },
                    other => other,
                })?;
            debug!(variable = %name, level = %risk.level, "risk classified");
            variables.insert(name.clone(), risk);
        }

        Ok(RiskReport { variables })
    }

    /// Classify one variable from its history, forecast path and bands
    pub fn classify_variable(
        &self,
        history: &[f64],
        forecast: &[f64],
        lower: &[f64],
        upper: &[f64],
    ) -> Result<VariableRisk> {
        if history.len() < 2 {
            return Err(ForecastError::InsufficientData {
                stage: Stage::RiskClassification,
                variable: None,
                required: 2,
                available: history.len(),
            });
        }
        if forecast.is_empty() || lower.len() != forecast.len() || upper.len() != forecast.len() {
            return Err(ForecastError::shape_mismatch(
                Stage::RiskClassification,
                "forecast and bands must be non-empty and of equal length",
            ));
        }

        let math = ForecastError::math(Stage::RiskClassification);
        let hist_std = stats::sample_std_dev(history).map_err(&math)?;
        let forecast_std = if forecast.len() < 2 {
            0.0
        } else {
            stats::sample_std_dev(forecast).map_err(&math)?
        };
        let widths: Vec<f64> = upper.iter().zip(lower).map(|(u, l)| u - l).collect();
        let confidence_width = stats::mean(&widths).map_err(&math)?;

        if hist_std == 0.0 {
            let level = if forecast_std > 0.0 {
                RiskLevel::High
            } else {
                RiskLevel::Low
            };
            return Ok(VariableRisk {
                level,
                volatility_ratio: None,
                confidence_width,
            });
        }

        let ratio = forecast_std / hist_std;
        let t = &self.thresholds;
        let level = if ratio > t.high_ratio || confidence_width > t.high_width * hist_std {
            RiskLevel::High
        } else if ratio > t.medium_ratio || confidence_width > t.medium_width * hist_std {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Ok(VariableRisk {
            level,
            volatility_ratio: Some(ratio),
            confidence_width,
        })
    }
}
