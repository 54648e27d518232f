use chrono::NaiveDate;
use var_forecast::models::{ForecastModel, TrainedForecastModel};
use var_forecast::sample::{generate_indicators, DEFAULT_INDICATORS};
use var_forecast::{
    assess_scenario, ElasticityAnalyzer, RiskClassifier, SeriesPreparer, ShockScenario,
    UncertaintySimulator, VarEstimator,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("VAR Forecast: Basic Forecasting Example");
    println!("=======================================\n");

    // Four years of monthly synthetic indicators
    println!("Creating sample data...");
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).ok_or("invalid start date")?;
    let history = generate_indicators(&DEFAULT_INDICATORS, start, 48, 2024)?;
    println!(
        "Sample data created: {} monthly observations of {:?}\n",
        history.len(),
        history.variables()
    );

    // Clean and fit
    println!("Training model...");
    let estimator = VarEstimator::new(4)?;
    let prepared = SeriesPreparer::new(estimator.maxlags()).prepare_complete(&history)?;
    let model = estimator.train(&prepared)?;
    println!("Selected {} on {} observations", TrainedForecastModel::name(&model), model.n_obs());
    for candidate in model.lag_candidates() {
        println!("  p = {}: AIC {:?}", candidate.lag_order, candidate.aic);
    }

    // Point forecast
    println!("\nGenerating forecasts...");
    let forecast = model.forecast(6)?;
    for (name, path) in forecast.to_map() {
        let values: Vec<String> = path.iter().map(|v| format!("{:.2}", v)).collect();
        println!("  {:<14} {}", name, values.join(", "));
    }

    // Monte Carlo bands
    let ensemble = UncertaintySimulator::new(1000)?.with_seed(7).simulate(&model, 6)?;
    println!("\nGDP 95% confidence intervals:");
    let gdp = model.variable_index("GDP").ok_or("GDP missing")?;
    for (i, (lower, upper)) in ensemble
        .lower_column(gdp)
        .iter()
        .zip(ensemble.upper_column(gdp))
        .enumerate()
    {
        println!("  Month {}: ({:.2}, {:.2})", i + 1, lower, upper);
    }

    // Elasticities
    println!("\nElasticities (shock 0.01):");
    let analyzer = ElasticityAnalyzer::default();
    for name in model.variables() {
        let result = analyzer.analyze(&model, name, 0.01)?;
        println!(
            "  {:<14} short-run {:>8.3}  long-run {:>8.3}  max {:>8.3}",
            name, result.short_run, result.long_run, result.max_impact
        );
    }

    // Risk
    let report =
        RiskClassifier::default().classify(&prepared, &forecast, &ensemble.lower, &ensemble.upper)?;
    println!("\nRisk assessment:");
    for (name, risk) in report.iter() {
        println!(
            "  {:<14} {:<6} ratio {:?} width {:.3}",
            name, risk.level, risk.volatility_ratio, risk.confidence_width
        );
    }

    // Shock scenario
    let scenario = ShockScenario::new("Interest_Rate", 0.5, 36).apply(&history, 1)?;
    let assessment = assess_scenario(&scenario.results)?;
    println!(
        "\n{}: risk {} (max change {:.2}, max volatility {:.2})",
        scenario.name, assessment.risk_level, assessment.max_change, assessment.max_volatility
    );

    println!("\nEstimator: {}", estimator.name());

    Ok(())
}
