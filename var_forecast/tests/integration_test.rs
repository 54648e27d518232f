use approx::assert_relative_eq;
use chrono::NaiveDate;
use econ_math::stats;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::io::Write;
use tempfile::NamedTempFile;
use var_forecast::sample::month_end_timestamps;
use var_forecast::{
    DataLoader, EngineConfig, ForecastError, ForecastService, MultivariateSeries, PointForecast,
    RawSeries, RiskClassifier, RiskLevel, SeriesPreparer, Stage,
};

// 40 monthly observations: GDP on a linear trend, Inflation roughly flat
fn gdp_inflation(seed: u64) -> MultivariateSeries {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let timestamps = month_end_timestamps(start, 40).unwrap();
    let noise = Normal::new(0.0, 0.1).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);

    let gdp: Vec<f64> = (0..40)
        .map(|t| 2.0 + 0.05 * t as f64 + noise.sample(&mut rng))
        .collect();
    let inflation: Vec<f64> = (0..40).map(|_| 2.0 + noise.sample(&mut rng)).collect();

    MultivariateSeries::from_columns(
        timestamps,
        vec![
            ("GDP".to_string(), gdp),
            ("Inflation".to_string(), inflation),
        ],
    )
    .unwrap()
}

fn raw(seed: u64) -> RawSeries {
    gdp_inflation(seed).to_raw()
}

fn seeded_service() -> ForecastService {
    let config = EngineConfig {
        horizon: 4,
        n_simulations: 200,
        seed: Some(42),
        ..EngineConfig::default()
    };
    ForecastService::new(config).unwrap()
}

#[test]
fn test_full_forecast_workflow() {
    let service = seeded_service();
    let report = service.run(&raw(1), &[]).unwrap();

    assert!((1..=5).contains(&report.lag_order));
    assert_eq!(report.forecast.len(), 2);
    assert!(report.forecast.values().all(|path| path.len() == 4));
    assert_eq!(report.timestamps.as_ref().map(|t| t.len()), Some(4));

    let bands = &report.confidence_intervals;
    assert_eq!(bands.lower.len(), 4);
    assert_eq!(bands.variables, vec!["GDP".to_string(), "Inflation".to_string()]);
    assert_eq!(bands.seed, 42);

    assert_eq!(report.elasticities.len(), 2);
    assert_eq!(report.risk_assessment.len(), 2);
    assert_eq!(report.overall_risk, report.risk_assessment.overall());

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["risk_assessment"]["GDP"]["level"].is_string());
    assert!(json["confidence_intervals"]["upper"].is_array());
}

#[test]
fn test_forecast_has_one_vector_per_step() {
    let forecast = seeded_service().forecast(&raw(2), 4).unwrap();
    assert_eq!(forecast["GDP"].len(), 4);
    assert_eq!(forecast["Inflation"].len(), 4);
}

#[test]
fn test_seeded_runs_are_identical() {
    let service = seeded_service();
    let first = service.run(&raw(3), &[]).unwrap();
    let second = service.run(&raw(3), &[]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_bands_bracket_the_mean() {
    let bands = seeded_service().uncertainty(&raw(4), 6, 500).unwrap();

    assert_eq!(bands.mean.len(), 6);
    for t in 0..6 {
        for j in 0..2 {
            assert!(bands.lower[t][j] <= bands.mean[t][j]);
            assert!(bands.mean[t][j] <= bands.upper[t][j]);
        }
    }
}

#[test]
fn test_long_run_is_sum_of_series() {
    let result = seeded_service().elasticity(&raw(5), "GDP", 0.01).unwrap();

    assert_eq!(result.series.len(), 20);
    assert_relative_eq!(result.long_run, result.series.iter().sum::<f64>());
    assert_relative_eq!(result.short_run, result.series[0]);
    assert!(result
        .series
        .iter()
        .all(|v| v.abs() <= result.max_impact));
}

#[test]
fn test_zero_shock_is_rejected() {
    let err = seeded_service().elasticity(&raw(6), "GDP", 0.0).unwrap_err();
    assert!(matches!(err, ForecastError::DivisionByZero { .. }));
    assert_eq!(err.stage(), Stage::Elasticity);
}

#[test]
fn test_unknown_elasticity_variable() {
    let err = seeded_service()
        .run(&raw(7), &["Unemployment".to_string()])
        .unwrap_err();
    assert_eq!(err.variable(), Some("Unemployment"));
}

#[test]
fn test_extreme_outlier_row_is_dropped() {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let timestamps = month_end_timestamps(start, 40).unwrap();
    let mut gdp: Vec<f64> = (0..40)
        .map(|t| 2.0 + 0.05 * t as f64 + 0.1 * (t as f64).sin())
        .collect();
    gdp[20] = 1000.0;
    let inflation: Vec<f64> = (0..40).map(|t| 2.0 + 0.1 * (1.3 * t as f64).cos()).collect();

    let series = MultivariateSeries::from_columns(
        timestamps,
        vec![
            ("GDP".to_string(), gdp),
            ("Inflation".to_string(), inflation),
        ],
    )
    .unwrap();

    let prepared = SeriesPreparer::new(5).prepare_complete(&series).unwrap();
    assert_eq!(prepared.len(), 39);
    assert!(prepared.column("GDP").unwrap().iter().all(|v| *v < 10.0));
}

#[test]
fn test_forecast_matching_history_is_low_risk() {
    let history = gdp_inflation(8);
    // Offsets with sample standard deviation 1, rescaled to each variable's history
    let unit = [-1.5, -0.5, 0.5, 1.5].map(|z: f64| z / (5.0_f64 / 3.0).sqrt());
    let scales: Vec<f64> = history
        .variables()
        .iter()
        .map(|name| stats::sample_std_dev(&history.column(name).unwrap()).unwrap())
        .collect();
    let levels = [4.0, 2.0];
    let steps: Vec<Vec<f64>> = unit
        .iter()
        .map(|z| (0..2).map(|j| levels[j] + z * scales[j]).collect())
        .collect();
    let lower: Vec<Vec<f64>> = steps
        .iter()
        .map(|s| s.iter().map(|v| v - 0.02).collect())
        .collect();
    let upper: Vec<Vec<f64>> = steps
        .iter()
        .map(|s| s.iter().map(|v| v + 0.02).collect())
        .collect();
    let forecast = PointForecast::new(history.variables().to_vec(), steps).unwrap();

    let report = RiskClassifier::default()
        .classify(&history, &forecast, &lower, &upper)
        .unwrap();
    for name in ["GDP", "Inflation"] {
        let risk = report.get(name).unwrap();
        assert_relative_eq!(risk.volatility_ratio.unwrap(), 1.0, epsilon = 1e-9);
        assert_eq!(risk.level, RiskLevel::Low);
    }
}

#[test]
fn test_csv_with_missing_cell() {
    let series = gdp_inflation(9);
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,GDP,Inflation").unwrap();
    for (i, (ts, row)) in series.timestamps().iter().zip(series.rows()).enumerate() {
        let inflation = if i == 10 {
            String::new()
        } else {
            row[1].to_string()
        };
        writeln!(file, "{},{},{}", ts.format("%Y-%m-%d"), row[0], inflation).unwrap();
    }

    let raw = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(raw.len(), 40);
    assert_eq!(raw.missing_count(), 1);

    let forecast = seeded_service().forecast(&raw, 3).unwrap();
    assert_eq!(forecast["GDP"].len(), 3);
}

#[test]
fn test_config_from_file_drives_service() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"maxlags": 2, "horizon": 3, "n_simulations": 100, "seed": 7, "irf_horizon": 10}}"#
    )
    .unwrap();

    let config = EngineConfig::from_json_file(file.path()).unwrap();
    let report = ForecastService::new(config)
        .unwrap()
        .run(&raw(10), &["Inflation".to_string()])
        .unwrap();

    assert!(report.lag_order <= 2);
    assert_eq!(report.forecast["GDP"].len(), 3);
    assert_eq!(report.elasticities["Inflation"].series.len(), 10);
    assert!(!report.elasticities.contains_key("GDP"));
}

#[test]
fn test_too_short_series_fails_in_preparation() {
    let short = gdp_inflation(11).slice(0, Some(4)).unwrap().to_raw();
    let err = seeded_service().forecast(&short, 2).unwrap_err();

    assert!(matches!(
        err,
        ForecastError::InsufficientData {
            stage: Stage::Preparation,
            required: 6,
            ..
        }
    ));
}
