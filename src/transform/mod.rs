//! Lag-window sample construction.

pub mod window;

pub use window::{
    build_trainval, offset_label, LagWindow, PredictorSpec, TrainvalSet, WindowSpec,
};
