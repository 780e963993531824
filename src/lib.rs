//! # reserve-forecast
//!
//! Trainval sample construction and quantile-forecast evaluation for
//! net-load reserve sizing.
//!
//! The trainval side turns timestamped forecast tables with validity flags
//! into lag-windowed predictor/response samples, dropping every sample that
//! touches a missing value. The evaluation side scores cross-validated
//! quantile predictions (coverage, pinball loss, exceedance, ramp rates)
//! and counts quantile crossings.

#![allow(clippy::type_complexity)]

pub mod config;
pub mod core;
pub mod error;
pub mod features;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod transform;

pub use error::{ReserveError, Result};

pub mod prelude {
    pub use crate::config::TrainvalConfig;
    pub use crate::core::{Masked, MaskedTable, ObservedTable, PredictionTable, Quantile};
    pub use crate::error::{ReserveError, Result};
    pub use crate::features::ResponseFormula;
    pub use crate::metrics::{evaluate_predictions, MetricsTable, QuantileMetrics};
    pub use crate::transform::{build_trainval, TrainvalSet, WindowSpec};
}
