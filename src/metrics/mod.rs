//! Evaluation of cross-validated quantile predictions.
//!
//! # Example
//!
//! ```
//! use reserve_forecast::metrics::{coverage, pinball_loss};
//!
//! let observed = vec![1.0, 2.0, 3.0, 4.0];
//! let predicted = vec![2.0, 2.0, 2.0, 2.0];
//!
//! assert_eq!(coverage(&observed, &predicted), 0.5);
//! assert!(pinball_loss(&observed, &predicted, 0.9) > 0.0);
//! ```

pub mod aggregate;
pub mod crossing;
pub mod quantile;

pub use aggregate::{evaluate_new_quantiles, evaluate_predictions, FoldAveragedMetrics, MetricsTable};
pub use crossing::{count_crossings, quantile_crossings, CrossingCounts};
pub use quantile::{
    calculate_quantile_metrics, closeness, coverage, exceedance, max_exceedance, pinball_loss,
    requirement, reserve_ramp_rate, Metric, QuantileMetrics,
};
