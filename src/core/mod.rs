//! Core data structures: masked values, timestamped tables, predictions and folds.

mod folds;
mod prediction;
mod table;
mod value;

pub use folds::ValidationMasks;
pub use prediction::{ObservedTable, PredictionTable, Quantile, QuantileTree};
pub use table::{MaskedTable, RawTable};
pub use value::Masked;
