//! CSV readers for raw tables, predictions, observations, masks and metrics.

use crate::core::{ObservedTable, PredictionTable, Quantile, RawTable, ValidationMasks};
use crate::error::{ReserveError, Result};
use crate::io::parse_timestamp;
use crate::metrics::{Metric, MetricsTable, QuantileMetrics};
use chrono::NaiveDateTime;
use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Level names of the prediction and metrics column keys.
pub const QUANTILE_LEVELS: [&str; 3] = ["quantile", "fold", "output"];

/// Empty and `NaN`/`NA` cells read as `NaN`.
pub fn parse_value(cell: &str) -> Result<f64> {
    match cell.trim() {
        "" | "NA" | "<NA>" | "NaN" | "nan" | "null" => Ok(f64::NAN),
        s => s
            .parse()
            .map_err(|_| ReserveError::Parse(format!("invalid number '{s}'"))),
    }
}

/// Validity flag: `true` marks a usable value.
pub fn parse_flag(cell: &str) -> Result<bool> {
    match cell.trim() {
        "true" | "True" | "TRUE" | "1" | "1.0" => Ok(true),
        "false" | "False" | "FALSE" | "0" | "0.0" => Ok(false),
        s => Err(ReserveError::Parse(format!("invalid validity flag '{s}'"))),
    }
}

fn open(path: &Path, has_headers: bool) -> Result<Reader<File>> {
    let file = File::open(path).map_err(|err| ReserveError::io("failed opening", path, err))?;
    Ok(ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(Trim::All)
        .from_reader(file))
}

fn row_error(path: &Path, row: usize, err: ReserveError) -> ReserveError {
    ReserveError::Parse(format!("'{}' row {row}: {err}", path.display()))
}

struct Timestamped<T> {
    columns: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    rows: Vec<Vec<T>>,
}

/// Header row, then `timestamp,cell,cell,...` rows.
fn read_timestamped<T, F>(path: &Path, parse: F) -> Result<Timestamped<T>>
where
    F: Fn(&str) -> Result<T>,
{
    let mut reader = open(path, true)?;

    let headers = reader
        .headers()
        .map_err(|err| ReserveError::csv(path, err))?
        .clone();
    if headers.is_empty() {
        return Err(ReserveError::EmptyData);
    }
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut timestamps = Vec::new();
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|err| ReserveError::csv(path, err))?;
        let row = i + 2;
        let ts = parse_timestamp(&record[0]).map_err(|e| row_error(path, row, e))?;
        let cells = record
            .iter()
            .skip(1)
            .map(&parse)
            .collect::<Result<Vec<T>>>()
            .map_err(|e| row_error(path, row, e))?;
        timestamps.push(ts);
        rows.push(cells);
    }

    debug!(path = %path.display(), rows = rows.len(), columns = columns.len(), "read csv");
    Ok(Timestamped {
        columns,
        timestamps,
        rows,
    })
}

/// Raw value table (`timestamp,<column>...`).
pub fn read_value_table(path: impl AsRef<Path>) -> Result<RawTable<f64>> {
    let t = read_timestamped(path.as_ref(), parse_value)?;
    RawTable::from_rows(t.timestamps, t.columns, t.rows)
}

/// Validity table with the same layout as the value table.
pub fn read_validity_table(path: impl AsRef<Path>) -> Result<RawTable<bool>> {
    let t = read_timestamped(path.as_ref(), parse_flag)?;
    RawTable::from_rows(t.timestamps, t.columns, t.rows)
}

/// Observations (`timestamp,<output>...`).
pub fn read_observed(path: impl AsRef<Path>) -> Result<ObservedTable> {
    let t = read_timestamped(path.as_ref(), parse_value)?;
    let mut observed = ObservedTable::new(t.timestamps)?;
    for (c, name) in t.columns.iter().enumerate() {
        observed.insert(name.clone(), t.rows.iter().map(|row| row[c]).collect())?;
    }
    Ok(observed)
}

/// Headerless `fold_id,flag,flag,...` rows.
pub fn read_masks(path: impl AsRef<Path>) -> Result<ValidationMasks> {
    let path = path.as_ref();
    let mut reader = open(path, false)?;

    let mut ids = Vec::new();
    let mut masks = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|err| ReserveError::csv(path, err))?;
        let flags = record
            .iter()
            .skip(1)
            .map(parse_flag)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| row_error(path, i + 1, e))?;
        ids.push(record[0].to_string());
        masks.push(flags);
    }
    ValidationMasks::new(ids, masks)
}

/// Column keys from the leading header rows, plus the data records.
struct MultiHeader {
    keys: Vec<Vec<String>>,
    records: Vec<StringRecord>,
}

/// Read `levels.len()` header rows whose first cell is the level name (or
/// empty). A single index-name row directly after the headers is skipped
/// when its value cells are empty and `is_index` rejects its first cell.
fn read_multi_header<F>(path: &Path, levels: &[&str], is_index: F) -> Result<MultiHeader>
where
    F: Fn(&str) -> bool,
{
    let mut reader = open(path, false)?;

    let mut records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| ReserveError::csv(path, err))?;
    if records.len() < levels.len() {
        return Err(ReserveError::InsufficientData {
            needed: levels.len(),
            got: records.len(),
        });
    }
    let mut data = records.split_off(levels.len());

    for (record, level) in records.iter().zip(levels) {
        let name = &record[0];
        if !name.is_empty() && !name.eq_ignore_ascii_case(level) {
            return Err(ReserveError::Parse(format!(
                "'{}': expected header row '{level}', found '{name}'",
                path.display()
            )));
        }
    }

    let n_columns = records[0].len().saturating_sub(1);
    let keys = (1..=n_columns)
        .map(|c| records.iter().map(|r| r[c].to_string()).collect())
        .collect();

    if let Some(first) = data.first() {
        if !is_index(&first[0]) && first.iter().skip(1).all(str::is_empty) {
            data.remove(0);
        }
    }

    Ok(MultiHeader {
        keys,
        records: data,
    })
}

/// Prediction table with `quantile`, `fold` and `output` header rows.
pub fn read_predictions(path: impl AsRef<Path>) -> Result<PredictionTable> {
    let path = path.as_ref();
    let multi = read_multi_header(path, &QUANTILE_LEVELS, |cell| parse_timestamp(cell).is_ok())?;
    let header_rows = QUANTILE_LEVELS.len();

    let mut timestamps = Vec::with_capacity(multi.records.len());
    let mut columns = vec![Vec::with_capacity(multi.records.len()); multi.keys.len()];
    for (i, record) in multi.records.iter().enumerate() {
        let row = header_rows + i + 1;
        timestamps.push(parse_timestamp(&record[0]).map_err(|e| row_error(path, row, e))?);
        for (c, cell) in record.iter().skip(1).enumerate() {
            columns[c].push(parse_value(cell).map_err(|e| row_error(path, row, e))?);
        }
    }

    let mut table = PredictionTable::new(timestamps)?;
    for (key, values) in multi.keys.into_iter().zip(columns) {
        let tau: Quantile = key[0].parse()?;
        table.insert(tau, key[1].clone(), key[2].clone(), values)?;
    }
    Ok(table)
}

/// Metrics table previously written by [`crate::io::write_metrics`].
pub fn read_metrics(path: impl AsRef<Path>) -> Result<MetricsTable> {
    let path = path.as_ref();
    let multi = read_multi_header(path, &QUANTILE_LEVELS, |cell| {
        Metric::from_name(cell).is_some()
    })?;

    let mut rows: HashMap<Metric, &StringRecord> = HashMap::new();
    for record in &multi.records {
        let metric = Metric::from_name(&record[0]).ok_or_else(|| {
            ReserveError::Parse(format!(
                "'{}': unknown metric '{}'",
                path.display(),
                &record[0]
            ))
        })?;
        if rows.insert(metric, record).is_some() {
            return Err(ReserveError::Parse(format!(
                "'{}': duplicate metric row '{metric}'",
                path.display()
            )));
        }
    }
    if let Some(missing) = Metric::ALL.into_iter().find(|m| !rows.contains_key(m)) {
        return Err(ReserveError::Parse(format!(
            "'{}': metric '{missing}' is missing",
            path.display()
        )));
    }

    let mut table = MetricsTable::new();
    for (c, key) in multi.keys.iter().enumerate() {
        let mut parsed = HashMap::new();
        for (&metric, record) in &rows {
            parsed.insert(metric, parse_value(&record[c + 1])?);
        }
        let tau: Quantile = key[0].parse()?;
        table.insert(
            tau,
            key[1].clone(),
            key[2].clone(),
            QuantileMetrics::from_fn(|m| parsed[&m]),
        );
    }
    Ok(table)
}
