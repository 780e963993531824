//! Lag-window expansion of a masked table into trainval samples.
//!
//! Each raw column contributes one predictor row per time-step offset in its
//! inclusive lag window. A base index `i` yields a sample whose predictors
//! are `column[i + k]`, whose response is `response[i + lead]` and whose
//! reference datetimes cover every offset touched by the sample. Samples with
//! any missing predictor or a missing response are dropped.

use crate::core::{Masked, MaskedTable};
use crate::error::{ReserveError, Result};
use chrono::NaiveDateTime;
use std::ops::{Range, RangeInclusive};
use tracing::debug;

/// Inclusive window of time-step offsets relative to the base timestamp.
///
/// 0 is the present, positive offsets are forecast horizons, negative ones
/// are past steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagWindow {
    start: i64,
    end: i64,
}

/// Largest offset magnitude a window or response lead may use.
pub const MAX_OFFSET: i64 = 1 << 20;

fn check_offset(what: &str, offset: i64) -> Result<()> {
    if offset.abs() > MAX_OFFSET {
        return Err(ReserveError::InvalidParameter(format!(
            "{what} {offset} is beyond the supported range of +/-{MAX_OFFSET} steps"
        )));
    }
    Ok(())
}

impl LagWindow {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        check_offset("lag window start", start)?;
        check_offset("lag window end", end)?;
        if start > end {
            return Err(ReserveError::InvalidParameter(format!(
                "lag window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Single-offset window.
    pub fn at(offset: i64) -> Result<Self> {
        Self::new(offset, offset)
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of offsets covered; never zero.
    pub fn width(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn offsets(&self) -> RangeInclusive<i64> {
        self.start..=self.end
    }
}

/// Label suffix for an offset: `T-2`, `T0`, `T+1`.
pub fn offset_label(offset: i64) -> String {
    match offset {
        0 => "T0".to_string(),
        k if k > 0 => format!("T+{k}"),
        k => format!("T{k}"),
    }
}

/// One raw column, its lag window and the labels of the rows it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorSpec {
    column: String,
    window: LagWindow,
    labels: Vec<String>,
}

impl PredictorSpec {
    /// Labels are generated as `{prefix}_{offset_label}`.
    pub fn new(column: impl Into<String>, window: LagWindow, label_prefix: &str) -> Self {
        let labels = window
            .offsets()
            .map(|k| format!("{label_prefix}_{}", offset_label(k)))
            .collect();
        Self {
            column: column.into(),
            window,
            labels,
        }
    }

    /// Explicit labels, one per offset in increasing order.
    pub fn with_labels(
        column: impl Into<String>,
        window: LagWindow,
        labels: Vec<String>,
    ) -> Result<Self> {
        let column = column.into();
        if labels.len() != window.width() {
            return Err(ReserveError::LabelCountMismatch {
                column,
                expected: window.width(),
                got: labels.len(),
            });
        }
        Ok(Self {
            column,
            window,
            labels,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn window(&self) -> LagWindow {
        self.window
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Full sample layout: predictors in order, then the response lead.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    predictors: Vec<PredictorSpec>,
    response_label: String,
    response_lead: i64,
}

impl WindowSpec {
    pub fn new(
        predictors: Vec<PredictorSpec>,
        response_label: impl Into<String>,
        response_lead: i64,
    ) -> Result<Self> {
        if predictors.is_empty() {
            return Err(ReserveError::InvalidParameter(
                "at least one predictor is required".to_string(),
            ));
        }
        if response_lead < 0 {
            return Err(ReserveError::InvalidParameter(format!(
                "response lead must be non-negative, got {response_lead}"
            )));
        }
        check_offset("response lead", response_lead)?;
        let mut seen = std::collections::HashSet::new();
        for label in predictors.iter().flat_map(|p| p.labels()) {
            if !seen.insert(label.as_str()) {
                return Err(ReserveError::InvalidParameter(format!(
                    "duplicate predictor label '{label}'"
                )));
            }
        }
        Ok(Self {
            predictors,
            response_label: response_label.into(),
            response_lead,
        })
    }

    pub fn predictors(&self) -> &[PredictorSpec] {
        &self.predictors
    }

    pub fn response_label(&self) -> &str {
        &self.response_label
    }

    pub fn response_lead(&self) -> i64 {
        self.response_lead
    }

    fn min_start(&self) -> i64 {
        self.predictors
            .iter()
            .map(|p| p.window.start)
            .min()
            .unwrap_or(0)
    }

    fn max_end(&self) -> i64 {
        self.predictors
            .iter()
            .map(|p| p.window.end)
            .max()
            .unwrap_or(0)
    }

    /// Steps of history every sample needs behind its base index.
    pub fn max_back(&self) -> usize {
        (-self.min_start()).max(0) as usize
    }

    /// Steps every sample needs ahead of its base index.
    pub fn max_ahead(&self) -> usize {
        self.max_end().max(self.response_lead).max(0) as usize
    }

    /// Predictor row labels in output order.
    pub fn predictor_labels(&self) -> Vec<String> {
        self.predictors
            .iter()
            .flat_map(|p| p.labels.iter().cloned())
            .collect()
    }

    pub fn n_predictors(&self) -> usize {
        self.predictors.iter().map(|p| p.window.width()).sum()
    }

    /// Offsets covered by the reference datetimes.
    pub fn datetime_offsets(&self) -> RangeInclusive<i64> {
        self.min_start().min(self.response_lead)..=self.max_end().max(self.response_lead)
    }

    pub fn datetime_labels(&self) -> Vec<String> {
        self.datetime_offsets().map(offset_label).collect()
    }

    /// Base indices with enough history and horizon in a table of `n` rows.
    pub fn valid_base_range(&self, n: usize) -> Range<usize> {
        let start = self.max_back();
        let end = n.saturating_sub(self.max_ahead()).max(start);
        start..end
    }
}

/// Trainval samples that survived validity filtering.
///
/// Matrices are stored label-major: `predictors[label][sample]`,
/// `datetimes[offset][sample]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainvalSet {
    pub predictor_labels: Vec<String>,
    pub response_label: String,
    pub datetime_labels: Vec<String>,
    /// Position of each sample's base timestamp in the source table.
    pub base_positions: Vec<usize>,
    pub base_timestamps: Vec<NaiveDateTime>,
    pub predictors: Vec<Vec<f64>>,
    pub response: Vec<f64>,
    pub datetimes: Vec<Vec<NaiveDateTime>>,
    /// Number of base indices considered before filtering.
    pub n_candidates: usize,
}

impl TrainvalSet {
    pub fn n_samples(&self) -> usize {
        self.base_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base_positions.is_empty()
    }

    /// Predictor vector of the `j`-th retained sample.
    pub fn predictor_vector(&self, j: usize) -> Option<Vec<f64>> {
        (j < self.n_samples()).then(|| self.predictors.iter().map(|row| row[j]).collect())
    }
}

/// Expand `table` into lagged samples and drop any with missing entries.
///
/// `response` must be aligned with the table's timestamp index.
pub fn build_trainval(
    table: &MaskedTable,
    response: &[Masked],
    spec: &WindowSpec,
) -> Result<TrainvalSet> {
    let n = table.len();
    if response.len() != n {
        return Err(ReserveError::DimensionMismatch {
            expected: n,
            got: response.len(),
        });
    }

    let columns = spec
        .predictors
        .iter()
        .map(|p| table.column(&p.column))
        .collect::<Result<Vec<_>>>()?;

    let range = spec.valid_base_range(n);
    let shift = |i: usize, k: i64| (i as i64 + k) as usize;

    // Unfiltered predictor rows over the candidate range.
    let mut rows: Vec<Vec<Masked>> = Vec::with_capacity(spec.n_predictors());
    for (p, column) in spec.predictors.iter().zip(&columns) {
        for k in p.window.offsets() {
            rows.push(range.clone().map(|i| column[shift(i, k)]).collect());
        }
    }
    let lead = spec.response_lead;
    let response_row: Vec<Masked> = range.clone().map(|i| response[shift(i, lead)]).collect();

    let keep: Vec<bool> = (0..range.len())
        .map(|j| response_row[j].is_present() && rows.iter().all(|row| row[j].is_present()))
        .collect();

    let retained: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter_map(|(j, &ok)| ok.then_some(j))
        .collect();

    debug!(
        candidates = range.len(),
        retained = retained.len(),
        max_back = spec.max_back(),
        max_ahead = spec.max_ahead(),
        "expanded lag windows"
    );

    let timestamps = table.timestamps();
    let base_positions: Vec<usize> = retained.iter().map(|&j| range.start + j).collect();

    Ok(TrainvalSet {
        predictor_labels: spec.predictor_labels(),
        response_label: spec.response_label.clone(),
        datetime_labels: spec.datetime_labels(),
        base_timestamps: base_positions.iter().map(|&i| timestamps[i]).collect(),
        predictors: rows
            .iter()
            .map(|row| retained.iter().map(|&j| row[j].to_f64()).collect())
            .collect(),
        response: retained.iter().map(|&j| response_row[j].to_f64()).collect(),
        datetimes: spec
            .datetime_offsets()
            .map(|k| base_positions.iter().map(|&i| timestamps[shift(i, k)]).collect())
            .collect(),
        base_positions,
        n_candidates: range.len(),
    })
}
