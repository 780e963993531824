//! Metric tables over every (quantile, fold, output) combination.

use crate::core::{ObservedTable, PredictionTable, Quantile, QuantileTree, ValidationMasks};
use crate::error::{ReserveError, Result};
use crate::metrics::quantile::{calculate_quantile_metrics, Metric, QuantileMetrics};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Metrics keyed by quantile, fold and output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    entries: QuantileTree<QuantileMetrics>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one entry.
    pub fn insert(
        &mut self,
        tau: Quantile,
        fold: impl Into<String>,
        output: impl Into<String>,
        metrics: QuantileMetrics,
    ) {
        self.entries
            .entry(tau)
            .or_default()
            .entry(fold.into())
            .or_default()
            .insert(output.into(), metrics);
    }

    pub fn get(&self, tau: Quantile, fold: &str, output: &str) -> Option<&QuantileMetrics> {
        self.entries.get(&tau)?.get(fold)?.get(output)
    }

    pub fn tree(&self) -> &QuantileTree<QuantileMetrics> {
        &self.entries
    }

    pub fn quantiles(&self) -> BTreeSet<Quantile> {
        self.entries.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (quantile, fold, output) entries.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|folds| folds.values())
            .map(|outputs| outputs.len())
            .sum()
    }

    /// Merge `other` into `self`; entries in `other` win on key collisions.
    pub fn merge(&mut self, other: MetricsTable) {
        for (tau, folds) in other.entries {
            for (fold, outputs) in folds {
                for (output, metrics) in outputs {
                    self.insert(tau, fold.clone(), output, metrics);
                }
            }
        }
    }

    /// Average every metric across folds, keeping quantile and output.
    ///
    /// `NaN` fold values are skipped; the average is `NaN` only when every
    /// fold is `NaN`.
    pub fn average_folds(&self) -> FoldAveragedMetrics {
        let mut entries = BTreeMap::new();
        for (tau, folds) in &self.entries {
            let mut by_output: BTreeMap<&str, Vec<&QuantileMetrics>> = BTreeMap::new();
            for outputs in folds.values() {
                for (output, metrics) in outputs {
                    by_output.entry(output.as_str()).or_default().push(metrics);
                }
            }

            let averaged: BTreeMap<String, QuantileMetrics> = by_output
                .into_iter()
                .map(|(output, per_fold)| {
                    let mean = QuantileMetrics::from_fn(|metric| nan_mean(&per_fold, metric));
                    (output.to_string(), mean)
                })
                .collect();
            entries.insert(*tau, averaged);
        }
        FoldAveragedMetrics { entries }
    }
}

fn nan_mean(values: &[&QuantileMetrics], metric: Metric) -> f64 {
    let present: Vec<f64> = values
        .iter()
        .map(|m| m.get(metric))
        .filter(|v| !v.is_nan())
        .collect();
    if present.is_empty() {
        f64::NAN
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    }
}

/// Metrics averaged across folds, keyed by quantile and output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldAveragedMetrics {
    entries: BTreeMap<Quantile, BTreeMap<String, QuantileMetrics>>,
}

impl FoldAveragedMetrics {
    pub fn get(&self, tau: Quantile, output: &str) -> Option<&QuantileMetrics> {
        self.entries.get(&tau)?.get(output)
    }

    pub fn entries(&self) -> &BTreeMap<Quantile, BTreeMap<String, QuantileMetrics>> {
        &self.entries
    }
}

/// Compute every metric for every (quantile, fold, output) in `predictions`.
///
/// When `masks` is given, each fold is scored only on the timestamps its
/// mask holds out; otherwise on the full index.
pub fn evaluate_predictions(
    predictions: &PredictionTable,
    observed: &ObservedTable,
    masks: Option<&ValidationMasks>,
) -> Result<MetricsTable> {
    if predictions.timestamps() != observed.timestamps() {
        return Err(ReserveError::TimestampError(
            "prediction and observed tables have different timestamp indices".to_string(),
        ));
    }
    if let Some(masks) = masks {
        if masks.n_timestamps() != predictions.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: predictions.len(),
                got: masks.n_timestamps(),
            });
        }
    }

    let timestamps = predictions.timestamps();
    let all_positions: Vec<usize> = (0..predictions.len()).collect();
    let mut table = MetricsTable::new();

    for (tau, folds) in predictions.tree() {
        for (fold, outputs) in folds {
            let positions = match masks {
                Some(m) => m.held_out(fold)?,
                None => all_positions.clone(),
            };
            let ts: Vec<_> = positions.iter().map(|&i| timestamps[i]).collect();

            for (output, predicted) in outputs {
                let actual = observed.output(output)?;
                let obs: Vec<f64> = positions.iter().map(|&i| actual[i]).collect();
                let pred: Vec<f64> = positions.iter().map(|&i| predicted[i]).collect();

                let metrics = if positions.is_empty() {
                    warn!(%tau, fold = %fold, output = %output, "fold holds out no timestamps");
                    QuantileMetrics::from_fn(|_| f64::NAN)
                } else {
                    calculate_quantile_metrics(&obs, &pred, &ts, tau.value())?
                };
                debug!(%tau, fold = %fold, output = %output, samples = positions.len(), "scored");
                table.insert(*tau, fold.clone(), output.clone(), metrics);
            }
        }
    }

    info!(entries = table.len(), "computed quantile metrics");
    Ok(table)
}

/// Score only the quantiles absent from `previous`, then merge them into it.
pub fn evaluate_new_quantiles(
    predictions: &PredictionTable,
    observed: &ObservedTable,
    masks: Option<&ValidationMasks>,
    mut previous: MetricsTable,
) -> Result<MetricsTable> {
    let done = previous.quantiles();
    let pending: BTreeSet<Quantile> = predictions
        .quantiles()
        .into_iter()
        .filter(|tau| !done.contains(tau))
        .collect();

    info!(
        reused = done.len(),
        new = pending.len(),
        "appending metrics for new quantiles"
    );
    if pending.is_empty() {
        return Ok(previous);
    }

    let fresh = evaluate_predictions(&predictions.select_quantiles(&pending), observed, masks)?;
    previous.merge(fresh);
    Ok(previous)
}
