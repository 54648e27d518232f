//! Deterministic multi-step forecasts from a fitted VAR

use crate::error::{ForecastError, Result, Stage};
use crate::models::FittedVarModel;
use crate::utils::future_timestamps;
use chrono::{DateTime, Utc};
use nalgebra::DVector;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Point forecast: one row of values per step, one column per variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointForecast {
    variables: Vec<String>,
    steps: Vec<Vec<f64>>,
    timestamps: Option<Vec<DateTime<Utc>>>,
}

impl PointForecast {
    /// Create a forecast; every step must hold one value per variable
    pub fn new(variables: Vec<String>, steps: Vec<Vec<f64>>) -> Result<Self> {
        if let Some(i) = steps.iter().position(|s| s.len() != variables.len()) {
            return Err(ForecastError::shape_mismatch(
                Stage::Forecasting,
                format!(
                    "step {} has {} values for {} variables",
                    i + 1,
                    steps[i].len(),
                    variables.len()
                ),
            ));
        }

        Ok(Self {
            variables,
            steps,
            timestamps: None,
        })
    }

    /// Attach one timestamp per step
    pub fn with_timestamps(mut self, timestamps: Vec<DateTime<Utc>>) -> Result<Self> {
        if timestamps.len() != self.steps.len() {
            return Err(ForecastError::shape_mismatch(
                Stage::Forecasting,
                format!(
                    "{} timestamps for {} forecast steps",
                    timestamps.len(),
                    self.steps.len()
                ),
            ));
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    /// Variable names, in column order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Number of forecast steps
    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    /// All steps, first step first
    pub fn steps(&self) -> &[Vec<f64>] {
        &self.steps
    }

    /// Values of step `index` (0-based)
    pub fn step(&self, index: usize) -> Option<&[f64]> {
        self.steps.get(index).map(|s| s.as_slice())
    }

    /// Future timestamps, when the training series had a recognisable frequency
    pub fn timestamps(&self) -> Option<&[DateTime<Utc>]> {
        self.timestamps.as_deref()
    }

    /// Forecast path of the variable at `index`
    pub fn column_at(&self, index: usize) -> Vec<f64> {
        self.steps.iter().map(|s| s[index]).collect()
    }

    /// Forecast path of a named variable
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let index = self
            .variables
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| ForecastError::UnknownVariable {
                stage: Stage::Forecasting,
                name: name.to_string(),
            })?;
        Ok(self.column_at(index))
    }

    /// Forecast paths keyed by variable name
    pub fn to_map(&self) -> BTreeMap<String, Vec<f64>> {
        self.variables
            .iter()
            .enumerate()
            .map(|(j, name)| (name.clone(), self.column_at(j)))
            .collect()
    }
}

/// Produces point forecasts by iterating the VAR recursion
#[derive(Debug, Clone, Copy, Default)]
pub struct Forecaster;

impl Forecaster {
    /// Forecast `horizon` steps ahead, feeding each step back as a lag
    pub fn forecast(model: &FittedVarModel, horizon: usize) -> Result<PointForecast> {
        if horizon == 0 {
            return Err(ForecastError::invalid_parameter(
                Stage::Forecasting,
                "horizon must be at least 1",
            ));
        }

        let steps = Self::mean_path(model, horizon);
        let forecast = PointForecast::new(model.variables().to_vec(), steps)?;
        debug!(horizon, lag_order = model.lag_order(), "point forecast");

        match (model.last_timestamp(), model.frequency()) {
            (Some(last), Some(frequency)) => {
                let timestamps = future_timestamps(last, horizon, frequency)?;
                forecast.with_timestamps(timestamps)
            }
            _ => Ok(forecast),
        }
    }

    /// Conditional-mean path without timestamps
    pub(crate) fn mean_path(model: &FittedVarModel, horizon: usize) -> Vec<Vec<f64>> {
        let mut history: Vec<DVector<f64>> = model.warm_start().to_vec();
        let mut steps = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let next = model.next_mean(&history);
            steps.push(next.iter().copied().collect());
            history.push(next);
        }

        steps
    }
}
