//! CSV reports for metrics and quantile crossings.
//!
//! Metric columns carry one header row per key level (`quantile`, `fold`,
//! `output`) with the metric name in the first column of each data row.
//! `NaN` is written as an empty cell.

use crate::core::Quantile;
use crate::error::{ReserveError, Result};
use crate::io::csv_table::QUANTILE_LEVELS;
use crate::io::write_files_atomic;
use crate::metrics::{CrossingCounts, FoldAveragedMetrics, Metric, MetricsTable, QuantileMetrics};
use csv::Writer;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

fn cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn encode(path: &Path, rows: Vec<Vec<String>>) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    for row in &rows {
        writer
            .write_record(row)
            .map_err(|err| ReserveError::csv(path, err))?;
    }
    writer.into_inner().map_err(|err| {
        ReserveError::Serialization(format!("encoding '{}' failed: {err}", path.display()))
    })
}

fn metric_rows<'a>(columns: &'a [&'a QuantileMetrics]) -> impl Iterator<Item = Vec<String>> + 'a {
    Metric::ALL.into_iter().map(move |metric| {
        std::iter::once(metric.name().to_string())
            .chain(columns.iter().map(|m| cell(m.get(metric))))
            .collect()
    })
}

/// Encode the full metrics table, one column per (quantile, fold, output).
///
/// `path` only names the file in error messages.
pub fn encode_metrics(table: &MetricsTable, path: &Path) -> Result<Vec<u8>> {
    let mut keys: [Vec<String>; 3] = QUANTILE_LEVELS.map(|level| vec![level.to_string()]);
    let mut columns = Vec::new();
    for (tau, folds) in table.tree() {
        for (fold, outputs) in folds {
            for (output, metrics) in outputs {
                keys[0].push(tau.to_string());
                keys[1].push(fold.clone());
                keys[2].push(output.clone());
                columns.push(metrics);
            }
        }
    }

    let rows: Vec<Vec<String>> = keys.into_iter().chain(metric_rows(&columns)).collect();
    encode(path, rows)
}

/// Write the full metrics table.
pub fn write_metrics(table: &MetricsTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_files_atomic(&[(path.to_path_buf(), encode_metrics(table, path)?)])?;
    info!(path = %path.display(), columns = table.len(), "wrote metrics");
    Ok(())
}

/// Encode fold-averaged metrics, one column per (quantile, output).
pub fn encode_averaged_metrics(table: &FoldAveragedMetrics, path: &Path) -> Result<Vec<u8>> {
    let mut quantiles = vec!["quantile".to_string()];
    let mut outputs = vec!["output".to_string()];
    let mut columns = Vec::new();
    for (tau, by_output) in table.entries() {
        for (output, metrics) in by_output {
            quantiles.push(tau.to_string());
            outputs.push(output.clone());
            columns.push(metrics);
        }
    }

    let rows: Vec<Vec<String>> = [quantiles, outputs]
        .into_iter()
        .chain(metric_rows(&columns))
        .collect();
    encode(path, rows)
}

/// Write fold-averaged metrics.
pub fn write_averaged_metrics(table: &FoldAveragedMetrics, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_files_atomic(&[(path.to_path_buf(), encode_averaged_metrics(table, path)?)])?;
    info!(path = %path.display(), "wrote fold-averaged metrics");
    Ok(())
}

/// Crossing counts, one column per (fold, output) and one row per quantile
/// pair. Pairs absent from a column are left empty.
pub fn write_crossings(counts: &CrossingCounts, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let pairs: BTreeSet<(Quantile, Quantile)> = counts
        .values()
        .flat_map(|by_pair| by_pair.keys().copied())
        .collect();

    let mut folds = vec!["fold".to_string()];
    let mut outputs = vec!["output".to_string()];
    for (fold, output) in counts.keys() {
        folds.push(fold.clone());
        outputs.push(output.clone());
    }

    let mut rows = vec![folds, outputs];
    for (lower, upper) in &pairs {
        let mut row = vec![format!("{lower}-{upper}")];
        row.extend(counts.values().map(|by_pair| {
            by_pair
                .get(&(*lower, *upper))
                .map(|n| n.to_string())
                .unwrap_or_default()
        }));
        rows.push(row);
    }

    write_files_atomic(&[(path.to_path_buf(), encode(path, rows)?)])?;
    info!(path = %path.display(), pairs = pairs.len(), "wrote quantile crossings");
    Ok(())
}
