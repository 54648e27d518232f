//! Monte Carlo forecast uncertainty
//!
//! Every trial perturbs the forecast with multivariate-normal noise drawn
//! from the residual covariance. Trials run on the rayon pool; each trial
//! owns an RNG seeded from a sequence drawn off one base seed, so a seeded
//! run produces the same ensemble on any number of threads.

use crate::error::{ForecastError, Result, Stage};
use crate::forecast::Forecaster;
use crate::models::FittedVarModel;
use econ_math::linalg::{self, CovarianceFactor};
use econ_math::stats;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default number of Monte Carlo trials
pub const DEFAULT_TRIALS: usize = 1000;

/// Default two-sided confidence level of the bands
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// How noise enters a simulated trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    /// Independent noise added to the deterministic point forecast
    #[default]
    Additive,
    /// Each noisy step is fed back through the VAR recursion
    Recursive,
}

/// Simulated trajectories and their per-step summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationEnsemble {
    /// `n × h × k` simulated paths
    #[serde(skip)]
    pub trajectories: Vec<Vec<Vec<f64>>>,
    /// `h × k` mean across trials
    pub mean: Vec<Vec<f64>>,
    /// `h × k` lower percentile band
    pub lower: Vec<Vec<f64>>,
    /// `h × k` upper percentile band
    pub upper: Vec<Vec<f64>>,
    /// Two-sided level the bands cover
    pub confidence_level: f64,
    /// Whether the residual covariance was replaced by its diagonal
    pub diagonal_fallback: bool,
    /// Base seed the trial seeds were drawn from
    pub seed: u64,
}

impl SimulationEnsemble {
    /// Number of trials
    pub fn n_trials(&self) -> usize {
        self.trajectories.len()
    }

    /// Number of forecast steps
    pub fn horizon(&self) -> usize {
        self.mean.len()
    }

    /// Lower band of the variable at `index`
    pub fn lower_column(&self, index: usize) -> Vec<f64> {
        self.lower.iter().map(|step| step[index]).collect()
    }

    /// Upper band of the variable at `index`
    pub fn upper_column(&self, index: usize) -> Vec<f64> {
        self.upper.iter().map(|step| step[index]).collect()
    }

    /// Mean path of the variable at `index`
    pub fn mean_column(&self, index: usize) -> Vec<f64> {
        self.mean.iter().map(|step| step[index]).collect()
    }
}

/// Monte Carlo simulator for forecast confidence bands
#[derive(Debug, Clone)]
pub struct UncertaintySimulator {
    n_trials: usize,
    confidence_level: f64,
    noise_model: NoiseModel,
    seed: Option<u64>,
}

impl Default for UncertaintySimulator {
    fn default() -> Self {
        Self {
            n_trials: DEFAULT_TRIALS,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            noise_model: NoiseModel::default(),
            seed: None,
        }
    }
}

impl UncertaintySimulator {
    /// Create a simulator running `n_trials` trials
    pub fn new(n_trials: usize) -> Result<Self> {
        if n_trials == 0 {
            return Err(ForecastError::invalid_parameter(
                Stage::Simulation,
                "number of trials must be at least 1",
            ));
        }

        Ok(Self {
            n_trials,
            ..Self::default()
        })
    }

    /// Fix the base seed for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the two-sided confidence level, strictly between 0 and 1
    pub fn with_confidence_level(mut self, level: f64) -> Result<Self> {
        if !(level > 0.0 && level < 1.0) {
            return Err(ForecastError::invalid_parameter(
                Stage::Simulation,
                format!("confidence level must lie in (0, 1), got {}", level),
            ));
        }
        self.confidence_level = level;
        Ok(self)
    }

    /// Choose how noise enters each trajectory
    pub fn with_noise_model(mut self, noise_model: NoiseModel) -> Self {
        self.noise_model = noise_model;
        self
    }

    /// Number of trials
    pub fn n_trials(&self) -> usize {
        self.n_trials
    }

    /// Simulate `horizon` steps and summarise the ensemble
    pub fn simulate(&self, model: &FittedVarModel, horizon: usize) -> Result<SimulationEnsemble> {
        if horizon == 0 {
            return Err(ForecastError::invalid_parameter(
                Stage::Simulation,
                "horizon must be at least 1",
            ));
        }

        let factor = linalg::factorize_covariance(model.residual_covariance()).map_err(|e| {
            ForecastError::invalid_parameter(Stage::Simulation, e.to_string())
        })?;
        if factor.used_diagonal_fallback() {
            warn!("residual covariance is not positive definite, using its diagonal");
        }

        let base_seed = self.seed.unwrap_or_else(|| StdRng::from_entropy().gen());
        let mut seeder = StdRng::seed_from_u64(base_seed);
        let trial_seeds: Vec<u64> = (0..self.n_trials).map(|_| seeder.gen()).collect();

        let point_path = Forecaster::mean_path(model, horizon);
        let trajectories: Vec<Vec<Vec<f64>>> = trial_seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                match self.noise_model {
                    NoiseModel::Additive => additive_trial(&point_path, &factor, &mut rng),
                    NoiseModel::Recursive => recursive_trial(model, horizon, &factor, &mut rng),
                }
            })
            .collect::<Result<_>>()?;
        debug!(trials = trajectories.len(), horizon, "monte carlo trials complete");

        let tail = (1.0 - self.confidence_level) / 2.0;
        let (mean, lower, upper) = summarise(&trajectories, horizon, model.n_variables(), tail)?;
        info!(
            trials = self.n_trials,
            horizon,
            seed = base_seed,
            noise_model = ?self.noise_model,
            "uncertainty simulation finished"
        );

        Ok(SimulationEnsemble {
            trajectories,
            mean,
            lower,
            upper,
            confidence_level: self.confidence_level,
            diagonal_fallback: factor.used_diagonal_fallback(),
            seed: base_seed,
        })
    }
}

fn draw_noise(factor: &CovarianceFactor, rng: &mut StdRng) -> Result<Vec<f64>> {
    let z: Vec<f64> = (0..factor.dim())
        .map(|_| rng.sample::<f64, _>(StandardNormal))
        .collect();
    factor
        .transform(&z)
        .map_err(ForecastError::math(Stage::Simulation))
}

fn additive_trial(
    point_path: &[Vec<f64>],
    factor: &CovarianceFactor,
    rng: &mut StdRng,
) -> Result<Vec<Vec<f64>>> {
    point_path
        .iter()
        .map(|step| {
            let noise = draw_noise(factor, rng)?;
            Ok(step.iter().zip(noise).map(|(y, u)| y + u).collect())
        })
        .collect()
}

fn recursive_trial(
    model: &FittedVarModel,
    horizon: usize,
    factor: &CovarianceFactor,
    rng: &mut StdRng,
) -> Result<Vec<Vec<f64>>> {
    let mut history: Vec<DVector<f64>> = model.warm_start().to_vec();
    let mut path = Vec::with_capacity(horizon);

    for _ in 0..horizon {
        let noise = DVector::from_vec(draw_noise(factor, rng)?);
        let next = model.next_mean(&history) + noise;
        path.push(next.iter().copied().collect());
        history.push(next);
    }

    Ok(path)
}

type Bands = (Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<Vec<f64>>);

/// Per-step, per-variable mean and tail quantiles across trials
fn summarise(
    trajectories: &[Vec<Vec<f64>>],
    horizon: usize,
    k: usize,
    tail: f64,
) -> Result<Bands> {
    let math = ForecastError::math(Stage::Simulation);
    let mut mean = vec![vec![0.0; k]; horizon];
    let mut lower = vec![vec![0.0; k]; horizon];
    let mut upper = vec![vec![0.0; k]; horizon];

    for t in 0..horizon {
        for j in 0..k {
            let mut values: Vec<f64> = trajectories.iter().map(|path| path[t][j]).collect();
            values.sort_by(f64::total_cmp);
            let low = stats::quantile_sorted(&values, tail).map_err(&math)?;
            let high = stats::quantile_sorted(&values, 1.0 - tail).map_err(&math)?;
            // Summation error can push the mean of identical draws past the bands
            mean[t][j] = stats::mean(&values).map_err(&math)?.clamp(low, high);
            lower[t][j] = low;
            upper[t][j] = high;
        }
    }

    Ok((mean, lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use pretty_assertions::assert_eq;

    fn model(covariance: DMatrix<f64>) -> FittedVarModel {
        FittedVarModel::from_parts(
            vec!["GDP".to_string(), "Inflation".to_string()],
            vec![DMatrix::from_row_slice(2, 2, &[0.6, 0.1, 0.0, 0.4])],
            DVector::from_column_slice(&[1.0, 0.5]),
            covariance,
            vec![DVector::from_column_slice(&[2.0, 1.0])],
        )
        .unwrap()
    }

    fn spd() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09])
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let simulator = UncertaintySimulator::new(200).unwrap().with_seed(42);
        let first = simulator.simulate(&model(spd()), 6).unwrap();
        let second = simulator.simulate(&model(spd()), 6).unwrap();

        assert_eq!(first.mean, second.mean);
        assert_eq!(first.lower, second.lower);
        assert_eq!(first.upper, second.upper);
        assert_eq!(first.seed, 42);
    }

    #[test]
    fn test_bands_bracket_the_mean() {
        for noise_model in [NoiseModel::Additive, NoiseModel::Recursive] {
            let ensemble = UncertaintySimulator::new(300)
                .unwrap()
                .with_seed(7)
                .with_noise_model(noise_model)
                .simulate(&model(spd()), 5)
                .unwrap();

            assert_eq!(ensemble.n_trials(), 300);
            assert_eq!(ensemble.horizon(), 5);
            for t in 0..5 {
                for j in 0..2 {
                    assert!(ensemble.lower[t][j] <= ensemble.mean[t][j]);
                    assert!(ensemble.mean[t][j] <= ensemble.upper[t][j]);
                }
            }
        }
    }

    #[test]
    fn test_singular_covariance_falls_back_to_diagonal() {
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let ensemble = UncertaintySimulator::new(50)
            .unwrap()
            .with_seed(1)
            .simulate(&model(singular), 3)
            .unwrap();
        assert!(ensemble.diagonal_fallback);
    }

    #[test]
    fn test_zero_covariance_reproduces_point_forecast() {
        let ensemble = UncertaintySimulator::new(10)
            .unwrap()
            .with_seed(3)
            .simulate(&model(DMatrix::zeros(2, 2)), 2)
            .unwrap();
        let point = Forecaster::forecast(&model(DMatrix::zeros(2, 2)), 2).unwrap();

        assert_eq!(ensemble.lower, point.steps().to_vec());
        assert_eq!(ensemble.upper, point.steps().to_vec());
        assert_eq!(ensemble.mean, point.steps().to_vec());
    }

    #[test]
    fn test_mean_of_identical_draws_stays_inside_bands() {
        // Ten copies of 0.1 sum to slightly less than 1.0
        let constant = FittedVarModel::from_parts(
            vec!["Interest_Rate".to_string()],
            vec![DMatrix::zeros(1, 1)],
            DVector::from_column_slice(&[0.1]),
            DMatrix::zeros(1, 1),
            vec![DVector::zeros(1)],
        )
        .unwrap();
        let ensemble = UncertaintySimulator::new(10)
            .unwrap()
            .with_seed(1)
            .simulate(&constant, 3)
            .unwrap();

        for t in 0..3 {
            assert!(ensemble.lower[t][0] <= ensemble.mean[t][0]);
            assert!(ensemble.mean[t][0] <= ensemble.upper[t][0]);
            assert_eq!(ensemble.mean[t][0], 0.1);
        }
    }

    #[test]
    fn test_invalid_settings() {
        assert!(UncertaintySimulator::new(0).is_err());
        assert!(UncertaintySimulator::default()
            .with_confidence_level(1.0)
            .is_err());
        let err = UncertaintySimulator::default()
            .simulate(&model(spd()), 0)
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Simulation);
    }
}
