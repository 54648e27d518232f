//! VAR forecast report
//!
//! Reads a wide indicator CSV, runs the forecasting pipeline and prints the
//! report as JSON.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use var_forecast::{DataLoader, EngineConfig, ForecastService};

/// Forecast macroeconomic indicators with a VAR model
#[derive(Parser, Debug)]
#[command(name = "var_report")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input CSV: timestamp column first, one column per indicator
    #[arg(value_name = "CSV")]
    input: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the forecast horizon
    #[arg(long)]
    horizon: Option<usize>,

    /// Override the simulation seed
    #[arg(long)]
    seed: Option<u64>,

    /// Indicators to compute elasticities for (default: all)
    #[arg(short, long = "elasticity", value_name = "VARIABLE")]
    elasticities: Vec<String>,

    /// Write the report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "VAR_REPORT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(horizon) = args.horizon {
        config.horizon = horizon;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    tracing::info!("{} v{}", var_forecast::NAME, var_forecast::VERSION);
    tracing::info!(
        input = %args.input.display(),
        maxlags = config.maxlags,
        horizon = config.horizon,
        n_simulations = config.n_simulations,
        "configuration loaded"
    );

    let raw = DataLoader::from_csv(&args.input)?;
    let service = ForecastService::new(config)?;
    let report = service.run(&raw, &args.elasticities)?;
    let json = serde_json::to_string_pretty(&report)?;

    match args.output {
        Some(path) => {
            fs::write(&path, json)?;
            tracing::info!(output = %path.display(), "report written");
        }
        None => println!("{}", json),
    }

    Ok(())
}
