//! Binary trainval artifacts.
//!
//! Each artifact is a [`LabeledMatrix`] encoded with bincode, which keeps
//! every `f64` bit pattern (including `NaN`) intact.

use crate::error::{ReserveError, Result};
use crate::io::write_files_atomic;
use crate::transform::window::TrainvalSet;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Rows are labels, columns are retained samples identified by the position
/// and timestamp of their base index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledMatrix<T> {
    pub row_labels: Vec<String>,
    pub column_positions: Vec<usize>,
    pub column_timestamps: Vec<NaiveDateTime>,
    /// values[row][column]
    pub values: Vec<Vec<T>>,
}

impl<T> LabeledMatrix<T> {
    pub fn n_rows(&self) -> usize {
        self.row_labels.len()
    }

    pub fn n_columns(&self) -> usize {
        self.column_positions.len()
    }

    pub fn row(&self, label: &str) -> Option<&[T]> {
        self.row_labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i].as_slice())
    }
}

/// The three matrices written for a trainval set.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainvalArtifacts {
    pub inputs: LabeledMatrix<f64>,
    pub output: LabeledMatrix<f64>,
    pub datetimes: LabeledMatrix<NaiveDateTime>,
}

fn labeled<T>(set: &TrainvalSet, row_labels: Vec<String>, values: Vec<Vec<T>>) -> LabeledMatrix<T> {
    LabeledMatrix {
        row_labels,
        column_positions: set.base_positions.clone(),
        column_timestamps: set.base_timestamps.clone(),
        values,
    }
}

impl From<&TrainvalSet> for TrainvalArtifacts {
    fn from(set: &TrainvalSet) -> Self {
        Self {
            inputs: labeled(set, set.predictor_labels.clone(), set.predictors.clone()),
            output: labeled(
                set,
                vec![set.response_label.clone()],
                vec![set.response.clone()],
            ),
            datetimes: labeled(set, set.datetime_labels.clone(), set.datetimes.clone()),
        }
    }
}

/// Destination of each artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub inputs: PathBuf,
    pub output: PathBuf,
    pub datetimes: PathBuf,
}

fn encode<T: Serialize>(value: &T, path: &Path) -> Result<(PathBuf, Vec<u8>)> {
    let bytes = bincode::serialize(value).map_err(|err| {
        ReserveError::Serialization(format!("encoding '{}' failed: {err}", path.display()))
    })?;
    Ok((path.to_path_buf(), bytes))
}

/// Encode all three artifacts, then write them all-or-nothing.
pub fn save_trainval(set: &TrainvalSet, paths: &ArtifactPaths) -> Result<()> {
    let artifacts = TrainvalArtifacts::from(set);
    let files = vec![
        encode(&artifacts.inputs, &paths.inputs)?,
        encode(&artifacts.output, &paths.output)?,
        encode(&artifacts.datetimes, &paths.datetimes)?,
    ];
    write_files_atomic(&files)?;

    info!(
        samples = set.n_samples(),
        inputs = %paths.inputs.display(),
        output = %paths.output.display(),
        datetimes = %paths.datetimes.display(),
        "saved trainval artifacts"
    );
    Ok(())
}

/// Read one artifact back.
pub fn load_matrix<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<LabeledMatrix<T>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|err| ReserveError::io("failed reading", path, err))?;
    bincode::deserialize(&bytes).map_err(|err| {
        ReserveError::Serialization(format!("decoding '{}' failed: {err}", path.display()))
    })
}
