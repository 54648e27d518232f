//! Forecasting models for multivariate time series

use crate::data::MultivariateSeries;
use crate::error::Result;
use crate::forecast::PointForecast;
use std::fmt::Debug;

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for future periods
    fn forecast(&self, horizons: usize) -> Result<PointForecast>;

    /// Variables the model forecasts, in output order
    fn variables(&self) -> &[String];

    /// Name of the model
    fn name(&self) -> String;
}

/// Forecast model that can be trained on time series data
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on time series data
    fn train(&self, data: &MultivariateSeries) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod var;

pub use var::{select_lag_order, FittedVarModel, LagCandidate, VarEstimator};
