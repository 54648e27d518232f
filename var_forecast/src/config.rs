//! Engine configuration

use crate::elasticity::{
    ElasticityAnalyzer, ShockConvention, DEFAULT_IRF_HORIZON, DEFAULT_SHOCK_SIZE,
};
use crate::error::{ForecastError, Result, Stage};
use crate::models::var::{VarEstimator, DEFAULT_MAXLAGS};
use crate::prepare::{OutlierPolicy, SeriesPreparer};
use crate::risk::{RiskClassifier, RiskThresholds};
use crate::simulation::{
    NoiseModel, UncertaintySimulator, DEFAULT_CONFIDENCE_LEVEL, DEFAULT_TRIALS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default forecast horizon
pub const DEFAULT_HORIZON: usize = 12;

/// Settings shared by every stage of the pipeline.
///
/// Missing JSON fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub maxlags: usize,
    pub horizon: usize,
    pub n_simulations: usize,
    pub shock_size: f64,
    pub irf_horizon: usize,
    pub confidence_level: f64,
    /// Base seed for simulations; `None` draws one from OS entropy
    pub seed: Option<u64>,
    pub noise_model: NoiseModel,
    pub shock_convention: ShockConvention,
    pub outlier_policy: OutlierPolicy,
    pub risk_thresholds: RiskThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            maxlags: DEFAULT_MAXLAGS,
            horizon: DEFAULT_HORIZON,
            n_simulations: DEFAULT_TRIALS,
            shock_size: DEFAULT_SHOCK_SIZE,
            irf_horizon: DEFAULT_IRF_HORIZON,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            seed: None,
            noise_model: NoiseModel::default(),
            shock_convention: ShockConvention::default(),
            outlier_policy: OutlierPolicy::default(),
            risk_thresholds: RiskThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject settings no stage can run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("maxlags", self.maxlags),
            ("horizon", self.horizon),
            ("n_simulations", self.n_simulations),
            ("irf_horizon", self.irf_horizon),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(config_error(format!("{} must be at least 1", name)));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(config_error(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !self.shock_size.is_finite() || self.shock_size == 0.0 {
            return Err(config_error(format!(
                "shock_size must be finite and non-zero, got {}",
                self.shock_size
            )));
        }
        Ok(())
    }

    /// Preparer requiring enough rows for `maxlags`
    pub fn preparer(&self) -> SeriesPreparer {
        SeriesPreparer::new(self.maxlags).with_policy(self.outlier_policy)
    }

    pub fn estimator(&self) -> Result<VarEstimator> {
        VarEstimator::new(self.maxlags)
    }

    pub fn simulator(&self) -> Result<UncertaintySimulator> {
        let simulator = UncertaintySimulator::new(self.n_simulations)?
            .with_confidence_level(self.confidence_level)?
            .with_noise_model(self.noise_model);
        Ok(match self.seed {
            Some(seed) => simulator.with_seed(seed),
            None => simulator,
        })
    }

    pub fn elasticity_analyzer(&self) -> Result<ElasticityAnalyzer> {
        Ok(ElasticityAnalyzer::new(self.irf_horizon)?.with_convention(self.shock_convention))
    }

    pub fn risk_classifier(&self) -> RiskClassifier {
        RiskClassifier::new(self.risk_thresholds)
    }
}

fn config_error(reason: String) -> ForecastError {
    ForecastError::invalid_parameter(Stage::Configuration, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"maxlags": 3, "seed": 42, "noise_model": "recursive"}"#,
        )
        .unwrap();

        assert_eq!(config.maxlags, 3);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.noise_model, NoiseModel::Recursive);
        assert_eq!(config.horizon, 12);
        assert_eq!(config.n_simulations, 1000);
        assert_eq!(config.shock_convention, ShockConvention::Orthogonalized);
        assert_eq!(config.outlier_policy, OutlierPolicy::UntilStable);
    }

    #[test]
    fn test_validation_rejects_zero_horizon() {
        let err = EngineConfig::from_json_str(r#"{"horizon": 0}"#).unwrap_err();
        assert_eq!(err.stage(), Stage::Configuration);
        assert!(err.to_string().contains("horizon"));
    }

    #[test]
    fn test_validation_rejects_confidence_level() {
        let config = EngineConfig {
            confidence_level: 1.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = EngineConfig::from_json_str("{maxlags: 3").unwrap_err();
        assert!(matches!(err, ForecastError::Json(_)));
    }
}
