//! Seeded synthetic series for demos and tests

use crate::data::MultivariateSeries;
use crate::error::{ForecastError, Result, Stage};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;
use std::f64::consts::PI;

/// Indicators produced by [`generate_indicators`]
pub const DEFAULT_INDICATORS: [&str; 4] = ["GDP", "Inflation", "Unemployment", "Interest_Rate"];

/// Shape of one synthetic indicator: `base + trend + cycle + noise`
#[derive(Debug, Clone, Copy)]
struct IndicatorProfile {
    base: f64,
    /// Total drift from the first to the last observation
    trend: f64,
    amplitude: f64,
    /// Cycle length over the whole sample, in multiples of π
    cycles: f64,
    noise_std: f64,
}

fn profile(indicator: &str) -> IndicatorProfile {
    match indicator {
        "GDP" => IndicatorProfile {
            base: 2.0,
            trend: 1.0,
            amplitude: 0.5,
            cycles: 4.0,
            noise_std: 0.3,
        },
        "Inflation" => IndicatorProfile {
            base: 2.0,
            trend: 2.0,
            amplitude: 0.3,
            cycles: 3.0,
            noise_std: 0.2,
        },
        "Unemployment" => IndicatorProfile {
            base: 5.0,
            trend: -2.0,
            amplitude: 1.0,
            cycles: 2.0,
            noise_std: 0.2,
        },
        // Cycle stays small enough for the path to rise monotonically
        "Interest_Rate" => IndicatorProfile {
            base: 2.0,
            trend: 3.0,
            amplitude: 0.2,
            cycles: 2.0,
            noise_std: 0.1,
        },
        _ => IndicatorProfile {
            base: 1.0,
            trend: 0.0,
            amplitude: 0.5,
            cycles: 2.0,
            noise_std: 0.2,
        },
    }
}

fn normal(std_dev: f64) -> Result<Normal> {
    Normal::new(0.0, std_dev)
        .map_err(|e| ForecastError::invalid_parameter(Stage::Ingestion, e.to_string()))
}

/// Month-end timestamps starting with the month of `start`
pub fn month_end_timestamps(start: NaiveDate, periods: usize) -> Result<Vec<DateTime<Utc>>> {
    let first = NaiveDate::from_ymd_opt(start.year(), start.month(), 1).ok_or_else(|| {
        ForecastError::invalid_parameter(Stage::Ingestion, format!("invalid start date {}", start))
    })?;

    (1..=periods as u32)
        .map(|i| {
            first
                .checked_add_months(Months::new(i))
                .and_then(|next| next.pred_opt())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
                .ok_or_else(|| {
                    ForecastError::invalid_parameter(Stage::Ingestion, "timestamp overflow")
                })
        })
        .collect()
}

/// Monthly synthetic macro indicators.
///
/// Each indicator is a base level plus a linear trend, a sine cycle and
/// Gaussian noise. Names outside [`DEFAULT_INDICATORS`] get a generic profile.
pub fn generate_indicators(
    indicators: &[&str],
    start: NaiveDate,
    periods: usize,
    seed: u64,
) -> Result<MultivariateSeries> {
    if periods < 2 {
        return Err(ForecastError::invalid_parameter(
            Stage::Ingestion,
            "at least two periods are needed",
        ));
    }

    let timestamps = month_end_timestamps(start, periods)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let last = (periods - 1) as f64;

    let columns = indicators
        .iter()
        .map(|&name| {
            let p = profile(name);
            let noise = normal(p.noise_std)?;
            let values: Vec<f64> = (0..periods)
                .map(|i| {
                    let x = i as f64 / last;
                    let cycle = p.amplitude * (p.cycles * PI * x).sin();
                    p.base + p.trend * x + cycle + rng_sample(&noise, &mut rng)
                })
                .collect();
            Ok((name.to_string(), values))
        })
        .collect::<Result<Vec<_>>>()?;

    MultivariateSeries::from_columns(timestamps, columns)
}

fn rng_sample(distribution: &Normal, rng: &mut StdRng) -> f64 {
    use rand::distributions::Distribution;
    distribution.sample(rng)
}

/// Simulate `y(t) = c + A·y(t-1) + u(t)` with `u ~ N(0, noise_std²·I)`.
///
/// Variables are named `y1 … yk`, timestamps are daily from 2000-01-01.
/// The first 100 draws are discarded as burn-in.
pub fn simulate_var1(
    a: &DMatrix<f64>,
    c: &DVector<f64>,
    noise_std: f64,
    periods: usize,
    seed: u64,
) -> Result<MultivariateSeries> {
    const BURN_IN: usize = 100;

    let k = c.len();
    if a.shape() != (k, k) {
        return Err(ForecastError::shape_mismatch(
            Stage::Ingestion,
            format!("coefficient matrix must be {}x{}", k, k),
        ));
    }

    let noise = normal(noise_std)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut y = DVector::<f64>::zeros(k);
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(periods);

    for t in 0..BURN_IN + periods {
        let u = DVector::from_fn(k, |_, _| rng_sample(&noise, &mut rng));
        y = c + a * &y + u;
        if t >= BURN_IN {
            rows.push(y.iter().copied().collect());
        }
    }

    let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).single().ok_or_else(|| {
        ForecastError::invalid_parameter(Stage::Ingestion, "invalid start timestamp")
    })?;
    let timestamps = (0..periods).map(|i| start + Duration::days(i as i64)).collect();
    let variables = (1..=k).map(|i| format!("y{}", i)).collect();

    MultivariateSeries::new(variables, timestamps, rows)
}
