use econ_math::MathError;
use rstest::rstest;
use std::io;
use var_forecast::{ForecastError, Stage};

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let forecast_error = ForecastError::from(io_error);
    assert!(matches!(forecast_error, ForecastError::IoError(_)));
    assert_eq!(forecast_error.stage(), Stage::Ingestion);

    let math_error = MathError::CalculationError("Matrix is not positive definite".to_string());
    let forecast_error = ForecastError::math(Stage::Simulation)(math_error);
    assert!(matches!(forecast_error, ForecastError::Math { .. }));
    assert_eq!(forecast_error.stage(), Stage::Simulation);
    assert!(forecast_error.to_string().contains("positive definite"));
    assert!(forecast_error.to_string().contains("simulation"));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let forecast_error = ForecastError::from(json_error);
    assert_eq!(forecast_error.stage(), Stage::Configuration);
}

#[test]
fn test_error_display_names_variable() {
    let error = ForecastError::InsufficientData {
        stage: Stage::Preparation,
        variable: Some("Inflation".to_string()),
        required: 6,
        available: 3,
    };
    assert_eq!(
        error.to_string(),
        "Insufficient data during preparation (variable 'Inflation'): need 6 observations, have 3"
    );

    let error = ForecastError::Estimation {
        lag_order: 2,
        variable: None,
        reason: "design matrix is rank-deficient".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Estimation failed for VAR(2): design matrix is rank-deficient"
    );
}

#[rstest]
#[case(ForecastError::UnknownVariable { stage: Stage::Elasticity, name: "Oil".to_string() }, Stage::Elasticity, Some("Oil"))]
#[case(ForecastError::DivisionByZero { stage: Stage::Elasticity, reason: "shock size is zero".to_string() }, Stage::Elasticity, None)]
#[case(ForecastError::Estimation { lag_order: 1, variable: Some("GDP".to_string()), reason: "constant".to_string() }, Stage::Estimation, Some("GDP"))]
#[case(ForecastError::InvalidSeries("unsorted".to_string()), Stage::Ingestion, None)]
fn test_stage_and_variable(
    #[case] error: ForecastError,
    #[case] stage: Stage,
    #[case] variable: Option<&str>,
) {
    assert_eq!(error.stage(), stage);
    assert_eq!(error.variable(), variable);
}
