//! # Econ Outlook
//!
//! Umbrella crate for the macroeconomic forecasting workspace.
//!
//! - [`econ_math`]: descriptive statistics and covariance helpers
//! - [`var_forecast`]: the VAR forecasting engine
//!
//! ## Example
//!
//! ```
//! use econ_outlook_workspace::prelude::*;
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.maxlags, 5);
//! assert!(ForecastService::new(config).is_ok());
//! ```

pub use econ_math;
pub use var_forecast;

/// The types most callers need
pub mod prelude {
    pub use var_forecast::{
        DataLoader, ElasticityResult, EngineConfig, ForecastError, ForecastReport,
        ForecastService, MultivariateSeries, PointForecast, RawSeries, RiskLevel, RiskReport,
        SimulationEnsemble,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_reaches_engine() {
        let service = ForecastService::default();
        assert_eq!(service.config().horizon, 12);
        assert_eq!(econ_math::stats::mean(&[1.0, 3.0]).unwrap(), 2.0);
    }
}
