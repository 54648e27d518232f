//! Shock scenarios applied to a historical series

use crate::data::MultivariateSeries;
use crate::error::{ForecastError, Result, Stage};
use crate::risk::RiskLevel;
use econ_math::stats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::collections::BTreeMap;
use tracing::info;

/// Share of the shock that spills over to every other indicator
pub const SPILLOVER_SCALE: f64 = 0.3;

/// Default scenario length in periods
pub const DEFAULT_DURATION: usize = 12;

/// A proportional level shift applied to one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockScenario {
    pub indicator: String,
    /// Shift as a fraction of the indicator's value at `shock_period`
    pub shock_size: f64,
    /// Row index from which the shift applies
    pub shock_period: usize,
    pub duration: usize,
}

/// Shocked series and the shifts applied to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub description: String,
    pub scenario: ShockScenario,
    /// Absolute shift added to the shocked indicator
    pub shock: f64,
    /// Shift added to each other indicator
    pub spillovers: BTreeMap<String, f64>,
    pub results: MultivariateSeries,
}

/// Summary risk of a scenario path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioAssessment {
    pub risk_level: RiskLevel,
    /// Largest absolute change between consecutive periods
    pub max_change: f64,
    /// Largest sample standard deviation across indicators
    pub max_volatility: f64,
}

impl ShockScenario {
    pub fn new(indicator: impl Into<String>, shock_size: f64, shock_period: usize) -> Self {
        Self {
            indicator: indicator.into(),
            shock_size,
            shock_period,
            duration: DEFAULT_DURATION,
        }
    }

    /// Shock a randomly chosen indicator at a random period
    pub fn random(base: &MultivariateSeries, shock_size: f64, seed: u64) -> Result<Self> {
        if base.is_empty() {
            return Err(ForecastError::InsufficientData {
                stage: Stage::Scenario,
                variable: None,
                required: 1,
                available: 0,
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let indicator = base.variables()[rng.gen_range(0..base.n_variables())].clone();
        let shock_period = rng.gen_range(0..base.len());
        Ok(Self::new(indicator, shock_size, shock_period))
    }

    /// Apply the shock to `base`; spillovers are drawn from `seed`
    pub fn apply(&self, base: &MultivariateSeries, seed: u64) -> Result<ScenarioOutcome> {
        if !self.shock_size.is_finite() {
            return Err(ForecastError::invalid_parameter(
                Stage::Scenario,
                format!("shock size must be finite, got {}", self.shock_size),
            ));
        }
        let target = base
            .variable_index(&self.indicator)
            .ok_or_else(|| ForecastError::UnknownVariable {
                stage: Stage::Scenario,
                name: self.indicator.clone(),
            })?;
        let anchor = base.row(self.shock_period).ok_or_else(|| {
            ForecastError::invalid_parameter(
                Stage::Scenario,
                format!(
                    "shock period {} is outside a series of {} rows",
                    self.shock_period,
                    base.len()
                ),
            )
        })?;

        let shock = self.shock_size * anchor[target];
        let unit = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::invalid_parameter(Stage::Scenario, e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(seed);

        let shifts: Vec<f64> = (0..base.n_variables())
            .map(|j| {
                if j == target {
                    shock
                } else {
                    SPILLOVER_SCALE * shock * rng.sample::<f64, _>(&unit)
                }
            })
            .collect();

        let rows = base
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if i < self.shock_period {
                    row.clone()
                } else {
                    row.iter().zip(&shifts).map(|(v, s)| v + s).collect()
                }
            })
            .collect();
        let results =
            MultivariateSeries::new(base.variables().to_vec(), base.timestamps().to_vec(), rows)?;

        let spillovers = base
            .variables()
            .iter()
            .zip(&shifts)
            .enumerate()
            .filter(|(j, _)| *j != target)
            .map(|(_, (name, s))| (name.clone(), *s))
            .collect();
        info!(indicator = %self.indicator, shock, period = self.shock_period, "scenario applied");

        Ok(ScenarioOutcome {
            name: format!("Shock to {}", self.indicator),
            description: format!(
                "Simulation of a {}% shock to {}",
                self.shock_size * 100.0,
                self.indicator
            ),
            scenario: self.clone(),
            shock,
            spillovers,
            results,
        })
    }
}

/// Classify a scenario path by its largest period change and volatility
pub fn assess_scenario(results: &MultivariateSeries) -> Result<ScenarioAssessment> {
    if results.len() < 2 {
        return Err(ForecastError::InsufficientData {
            stage: Stage::Scenario,
            variable: None,
            required: 2,
            available: results.len(),
        });
    }

    let mut max_change = 0.0_f64;
    let mut max_volatility = 0.0_f64;
    for j in 0..results.n_variables() {
        let column = results.column_at(j);
        let change = column
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0, f64::max);
        max_change = max_change.max(change);
        let volatility =
            stats::sample_std_dev(&column).map_err(ForecastError::math(Stage::Scenario))?;
        max_volatility = max_volatility.max(volatility);
    }

    let risk_level = if max_change > 2.0 || max_volatility > 1.0 {
        RiskLevel::High
    } else if max_change > 1.0 || max_volatility > 0.5 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    Ok(ScenarioAssessment {
        risk_level,
        max_change,
        max_volatility,
    })
}
