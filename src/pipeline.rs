//! End-to-end runs: CSV inputs to trainval artifacts, and prediction files
//! to metric reports.

use crate::config::TrainvalConfig;
use crate::core::{MaskedTable, RawTable};
use crate::error::Result;
use crate::features::calendar::append_calendar_columns;
use crate::features::response::ResponseFormula;
use crate::io::{self, ArtifactPaths};
use crate::metrics::{
    evaluate_new_quantiles, evaluate_predictions, quantile_crossings, CrossingCounts, MetricsTable,
};
use crate::transform::window::{build_trainval, TrainvalSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Build the trainval set from in-memory value and validity tables.
pub fn build_from_tables(
    values: RawTable<f64>,
    validity: RawTable<bool>,
    config: &TrainvalConfig,
) -> Result<TrainvalSet> {
    let mut table = MaskedTable::from_values_and_validity(values, validity)?;
    for (column, missing) in table.columns().iter().zip(table.missing_counts()) {
        if missing > 0 {
            debug!(column = %column, missing, "column has missing values");
        }
    }

    if let Some(calendar) = &config.calendar {
        info!(longitude = calendar.longitude, "computing calendar features");
        append_calendar_columns(&mut table, calendar)?;
    }

    let formula = config.response_formula()?;
    info!(response = formula.name(), "computing response");
    let response = formula.evaluate(&table)?;
    let spec = config.window_spec()?;
    let set = build_trainval(&table, &response, &spec)?;

    if set.is_empty() {
        warn!(
            observations = table.len(),
            "no valid trainval samples were produced"
        );
    }
    info!(
        "{} of {} trainval samples are valid",
        set.n_samples(),
        set.n_candidates
    );
    Ok(set)
}

/// Read the configured CSVs, build the trainval set and write its artifacts.
pub fn run_trainval(config: &TrainvalConfig) -> Result<TrainvalSet> {
    info!(
        values = %config.input.values.display(),
        validity = %config.input.validity.display(),
        "reading trainval inputs"
    );
    let values = io::read_value_table(&config.input.values)?;
    let validity = io::read_validity_table(&config.input.validity)?;

    let set = build_from_tables(values, validity, config)?;

    let paths = ArtifactPaths {
        inputs: config.output.inputs_path(),
        output: config.output.output_path(),
        datetimes: config.output.datetimes_path(),
    };
    io::save_trainval(&set, &paths)?;
    Ok(set)
}

/// File locations for an evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRun {
    pub predictions: PathBuf,
    pub observed: PathBuf,
    pub masks: Option<PathBuf>,
    /// Metrics written by an earlier run; only quantiles absent from it are scored.
    pub previous: Option<PathBuf>,
    pub output: PathBuf,
    /// Also write the fold-averaged table to this path.
    pub averaged_output: Option<PathBuf>,
}

/// Score a prediction file and write the metrics report(s).
///
/// Both reports are committed together, so a failed run writes neither.
pub fn run_evaluation(run: &EvaluationRun) -> Result<MetricsTable> {
    let predictions = io::read_predictions(&run.predictions)?;
    let observed = io::read_observed(&run.observed)?;
    let masks = run.masks.as_ref().map(io::read_masks).transpose()?;

    let metrics = match &run.previous {
        Some(path) => {
            let previous = io::read_metrics(path)?;
            evaluate_new_quantiles(&predictions, &observed, masks.as_ref(), previous)?
        }
        None => evaluate_predictions(&predictions, &observed, masks.as_ref())?,
    };

    let mut files = vec![(run.output.clone(), io::encode_metrics(&metrics, &run.output)?)];
    if let Some(path) = &run.averaged_output {
        let averaged = io::encode_averaged_metrics(&metrics.average_folds(), path)?;
        files.push((path.clone(), averaged));
    }
    io::write_files_atomic(&files)?;
    info!(
        path = %run.output.display(),
        columns = metrics.len(),
        averaged = run.averaged_output.is_some(),
        "wrote metrics"
    );
    Ok(metrics)
}

/// Count quantile crossings in a prediction file and write the report.
pub fn run_crossings(
    predictions: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<CrossingCounts> {
    let table = io::read_predictions(predictions)?;
    let counts = quantile_crossings(&table);
    let total: usize = counts.values().flat_map(|pairs| pairs.values()).sum();
    if total > 0 {
        warn!(total, "predicted quantiles cross");
    }
    io::write_crossings(&counts, output)?;
    Ok(counts)
}
