//! Error types for the reserve-forecast crate.

use std::path::Path;
use thiserror::Error;

/// Result type alias for trainval and evaluation operations.
pub type Result<T> = std::result::Result<T, ReserveError>;

/// Errors that can occur while building trainval sets or evaluating predictions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReserveError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// A column required by the configuration is absent from the table.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// Value and validity tables disagree on column order.
    #[error("column order mismatch at position {position}: values have '{values}', validity has '{validity}'")]
    ColumnOrderMismatch {
        position: usize,
        values: String,
        validity: String,
    },

    /// Explicit predictor labels do not match the lag window length.
    #[error("predictor '{column}' expects {expected} labels, got {got}")]
    LabelCountMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    /// A prediction fold has no validation mask.
    #[error("fold '{0}' has no validation mask")]
    MissingFold(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(String),

    /// Malformed input cell or record.
    #[error("parse error: {0}")]
    Parse(String),

    /// Artifact encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl ReserveError {
    pub(crate) fn io(action: &str, path: &Path, err: std::io::Error) -> Self {
        Self::Io(format!("{action} '{}': {err}", path.display()))
    }

    pub(crate) fn csv(path: &Path, err: csv::Error) -> Self {
        Self::Parse(format!("'{}': {err}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = ReserveError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = ReserveError::InsufficientData { needed: 10, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 10, got 5"
        );

        let err = ReserveError::MissingColumn("Load_RTPD_Forecast".to_string());
        assert_eq!(err.to_string(), "missing column 'Load_RTPD_Forecast'");

        let err = ReserveError::LabelCountMismatch {
            column: "Hour_Angle".to_string(),
            expected: 1,
            got: 2,
        };
        assert_eq!(
            err.to_string(),
            "predictor 'Hour_Angle' expects 1 labels, got 2"
        );

        let err = ReserveError::ColumnOrderMismatch {
            position: 1,
            values: "a".to_string(),
            validity: "b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "column order mismatch at position 1: values have 'a', validity has 'b'"
        );
    }

    #[test]
    fn io_errors_name_the_path() {
        let err = ReserveError::io(
            "failed reading",
            Path::new("inputs/values.csv"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(
            err.to_string(),
            "io error: failed reading 'inputs/values.csv': no such file"
        );
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = ReserveError::MissingFold("3".to_string());
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
