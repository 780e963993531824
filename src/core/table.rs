//! Time-indexed tables of raw values, validity flags and masked values.

use crate::core::Masked;
use crate::error::{ReserveError, Result};
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// A timestamp-indexed table with named columns, stored column-major.
///
/// Used for both the raw value table (`RawTable<f64>`) and the validity
/// table (`RawTable<bool>`) read from upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable<T> {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    /// data[column][observation]
    data: Vec<Vec<T>>,
}

impl<T: Clone> RawTable<T> {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        data: Vec<Vec<T>>,
    ) -> Result<Self> {
        validate_index(&timestamps)?;
        validate_columns(&columns, data.len())?;
        for column in &data {
            if column.len() != timestamps.len() {
                return Err(ReserveError::DimensionMismatch {
                    expected: timestamps.len(),
                    got: column.len(),
                });
            }
        }

        Ok(Self {
            timestamps,
            columns,
            data,
        })
    }

    /// Build from row-major records (`rows[observation][column]`).
    pub fn from_rows(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        rows: Vec<Vec<T>>,
    ) -> Result<Self> {
        if rows.len() != timestamps.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: timestamps.len(),
                got: rows.len(),
            });
        }
        for row in &rows {
            if row.len() != columns.len() {
                return Err(ReserveError::DimensionMismatch {
                    expected: columns.len(),
                    got: row.len(),
                });
            }
        }
        let data = (0..columns.len())
            .map(|c| rows.iter().map(|row| row[c].clone()).collect())
            .collect();
        Self::new(timestamps, columns, data)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Result<&[T]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data[i].as_slice())
            .ok_or_else(|| ReserveError::MissingColumn(name.to_string()))
    }
}

/// A value table with validity already folded in.
///
/// Every cell is a [`Masked`]; flagged-invalid cells are missing.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedTable {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: Vec<Vec<Masked>>,
}

impl MaskedTable {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        values: Vec<Vec<Masked>>,
    ) -> Result<Self> {
        let raw = RawTable::new(timestamps, columns, values)?;
        Ok(Self {
            timestamps: raw.timestamps,
            columns: raw.columns,
            values: raw.data,
        })
    }

    /// Embed validity flags into the values (`true` = usable).
    ///
    /// Both tables must share the same timestamp index and the same column
    /// names in the same order.
    pub fn from_values_and_validity(
        values: RawTable<f64>,
        validity: RawTable<bool>,
    ) -> Result<Self> {
        if values.columns.len() != validity.columns.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: values.columns.len(),
                got: validity.columns.len(),
            });
        }
        for (position, (v, f)) in values.columns.iter().zip(&validity.columns).enumerate() {
            if v != f {
                return Err(ReserveError::ColumnOrderMismatch {
                    position,
                    values: v.clone(),
                    validity: f.clone(),
                });
            }
        }
        if values.timestamps != validity.timestamps {
            return Err(ReserveError::TimestampError(
                "value and validity tables have different timestamp indices".to_string(),
            ));
        }

        let masked = values
            .data
            .iter()
            .zip(&validity.data)
            .map(|(vals, flags)| {
                vals.iter()
                    .zip(flags)
                    .map(|(&v, &ok)| Masked::from_flagged(v, ok))
                    .collect()
            })
            .collect();

        Ok(Self {
            timestamps: values.timestamps,
            columns: values.columns,
            values: masked,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Result<&[Masked]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
            .ok_or_else(|| ReserveError::MissingColumn(name.to_string()))
    }

    /// Append a derived column.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Masked>) -> Result<()> {
        let name = name.into();
        if self.columns.contains(&name) {
            return Err(ReserveError::InvalidParameter(format!(
                "column '{name}' already exists"
            )));
        }
        if values.len() != self.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        self.columns.push(name);
        self.values.push(values);
        Ok(())
    }

    /// Number of missing cells per column, in column order.
    pub fn missing_counts(&self) -> Vec<usize> {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| v.is_missing()).count())
            .collect()
    }
}

fn validate_index(timestamps: &[NaiveDateTime]) -> Result<()> {
    for i in 1..timestamps.len() {
        if timestamps[i] <= timestamps[i - 1] {
            return Err(ReserveError::TimestampError(format!(
                "timestamps must be strictly increasing ({} follows {})",
                timestamps[i],
                timestamps[i - 1]
            )));
        }
    }
    Ok(())
}

fn validate_columns(columns: &[String], data_columns: usize) -> Result<()> {
    if columns.len() != data_columns {
        return Err(ReserveError::DimensionMismatch {
            expected: columns.len(),
            got: data_columns,
        });
    }
    let mut seen = HashSet::new();
    for name in columns {
        if !seen.insert(name.as_str()) {
            return Err(ReserveError::InvalidParameter(format!(
                "duplicate column '{name}'"
            )));
        }
    }
    Ok(())
}
