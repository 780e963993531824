//! Cross-validated quantile predictions and the observations they are scored against.

use crate::error::{ReserveError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Target quantile level, strictly inside (0, 1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quantile(f64);

impl Quantile {
    pub fn new(tau: f64) -> Result<Self> {
        if !(tau > 0.0 && tau < 1.0) {
            return Err(ReserveError::InvalidParameter(format!(
                "quantile must be in (0, 1), got {tau}"
            )));
        }
        Ok(Self(tau))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Upper quantiles (tau >= 0.5) are scored on exceedances above the prediction.
    pub fn is_upper(self) -> bool {
        self.0 >= 0.5
    }
}

impl PartialEq for Quantile {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Quantile {}

impl PartialOrd for Quantile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Quantile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Quantile {
    type Err = ReserveError;

    fn from_str(s: &str) -> Result<Self> {
        let tau: f64 = s
            .trim()
            .parse()
            .map_err(|_| ReserveError::Parse(format!("invalid quantile '{s}'")))?;
        Self::new(tau)
    }
}

/// Nested `tau -> fold -> output -> series` mapping.
pub type QuantileTree<V> = BTreeMap<Quantile, BTreeMap<String, BTreeMap<String, V>>>;

/// Predicted series keyed by (quantile, fold, output), aligned to one timestamp index.
///
/// Missing predictions are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    timestamps: Vec<NaiveDateTime>,
    series: QuantileTree<Vec<f64>>,
}

impl PredictionTable {
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Result<Self> {
        check_increasing(&timestamps)?;
        Ok(Self {
            timestamps,
            series: BTreeMap::new(),
        })
    }

    /// Add the predicted series for one (quantile, fold, output) key.
    pub fn insert(
        &mut self,
        tau: Quantile,
        fold: impl Into<String>,
        output: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<()> {
        if values.len() != self.timestamps.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: self.timestamps.len(),
                got: values.len(),
            });
        }
        let fold = fold.into();
        let output = output.into();
        let outputs = self
            .series
            .entry(tau)
            .or_default()
            .entry(fold.clone())
            .or_default();
        if outputs.contains_key(&output) {
            return Err(ReserveError::InvalidParameter(format!(
                "duplicate prediction series ({tau}, {fold}, {output})"
            )));
        }
        outputs.insert(output, values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn tree(&self) -> &QuantileTree<Vec<f64>> {
        &self.series
    }

    /// Quantiles present, ascending.
    pub fn quantiles(&self) -> Vec<Quantile> {
        self.series.keys().copied().collect()
    }

    pub fn series(&self, tau: Quantile, fold: &str, output: &str) -> Option<&[f64]> {
        self.series
            .get(&tau)?
            .get(fold)?
            .get(output)
            .map(|v| v.as_slice())
    }

    /// Every (fold, output) pair present under any quantile.
    pub fn fold_output_pairs(&self) -> BTreeSet<(String, String)> {
        self.series
            .values()
            .flat_map(|folds| {
                folds.iter().flat_map(|(fold, outputs)| {
                    outputs.keys().map(move |output| (fold.clone(), output.clone()))
                })
            })
            .collect()
    }

    /// Copy restricted to the given quantiles.
    pub fn select_quantiles(&self, keep: &BTreeSet<Quantile>) -> Self {
        Self {
            timestamps: self.timestamps.clone(),
            series: self
                .series
                .iter()
                .filter(|(tau, _)| keep.contains(tau))
                .map(|(tau, folds)| (*tau, folds.clone()))
                .collect(),
        }
    }
}

/// Observed values per output, aligned to one timestamp index.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedTable {
    timestamps: Vec<NaiveDateTime>,
    outputs: BTreeMap<String, Vec<f64>>,
}

impl ObservedTable {
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Result<Self> {
        check_increasing(&timestamps)?;
        Ok(Self {
            timestamps,
            outputs: BTreeMap::new(),
        })
    }

    pub fn insert(&mut self, output: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.timestamps.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: self.timestamps.len(),
                got: values.len(),
            });
        }
        self.outputs.insert(output.into(), values);
        Ok(())
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn output(&self, name: &str) -> Result<&[f64]> {
        self.outputs
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| ReserveError::MissingColumn(name.to_string()))
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(|k| k.as_str())
    }
}

fn check_increasing(timestamps: &[NaiveDateTime]) -> Result<()> {
    if timestamps.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ReserveError::TimestampError(
            "timestamps must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_timestamps(n: usize) -> Vec<NaiveDateTime> {
        let base = NaiveDate::from_ymd_opt(2020, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| base + Duration::minutes(15 * i as i64)).collect()
    }

    fn q(tau: f64) -> Quantile {
        Quantile::new(tau).unwrap()
    }

    #[test]
    fn quantile_rejects_out_of_range() {
        assert!(Quantile::new(0.0).is_err());
        assert!(Quantile::new(1.0).is_err());
        assert!(Quantile::new(f64::NAN).is_err());
        assert!(Quantile::new(0.975).is_ok());
        assert!("0.5".parse::<Quantile>().unwrap().is_upper());
        assert!(!q(0.025).is_upper());
        assert!("abc".parse::<Quantile>().is_err());
    }

    #[test]
    fn quantiles_sort_numerically() {
        let mut taus = vec![q(0.95), q(0.05), q(0.5)];
        taus.sort();
        assert_eq!(taus, vec![q(0.05), q(0.5), q(0.95)]);
        assert_eq!(q(0.95).to_string(), "0.95");
    }

    #[test]
    fn prediction_table_indexes_by_three_levels() {
        let mut table = PredictionTable::new(make_timestamps(3)).unwrap();
        table.insert(q(0.95), "0", "Up", vec![1.0, 2.0, 3.0]).unwrap();
        table.insert(q(0.05), "0", "Up", vec![0.0, 0.5, 1.0]).unwrap();
        table.insert(q(0.95), "1", "Down", vec![1.0, 1.0, 1.0]).unwrap();

        assert_eq!(table.quantiles(), vec![q(0.05), q(0.95)]);
        assert_eq!(table.series(q(0.95), "0", "Up").unwrap(), &[1.0, 2.0, 3.0]);
        assert!(table.series(q(0.05), "1", "Down").is_none());

        let pairs = table.fold_output_pairs();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&("1".to_string(), "Down".to_string())));
    }

    #[test]
    fn prediction_table_rejects_misaligned_or_duplicate_series() {
        let mut table = PredictionTable::new(make_timestamps(3)).unwrap();
        assert!(matches!(
            table.insert(q(0.5), "0", "Up", vec![1.0]),
            Err(ReserveError::DimensionMismatch { .. })
        ));
        table.insert(q(0.5), "0", "Up", vec![1.0; 3]).unwrap();
        assert!(table.insert(q(0.5), "0", "Up", vec![2.0; 3]).is_err());
    }

    #[test]
    fn select_quantiles_keeps_only_requested() {
        let mut table = PredictionTable::new(make_timestamps(2)).unwrap();
        table.insert(q(0.05), "0", "Up", vec![1.0; 2]).unwrap();
        table.insert(q(0.95), "0", "Up", vec![2.0; 2]).unwrap();

        let keep: BTreeSet<_> = [q(0.95)].into_iter().collect();
        let selected = table.select_quantiles(&keep);
        assert_eq!(selected.quantiles(), vec![q(0.95)]);
    }

    #[test]
    fn observed_table_lookup() {
        let mut observed = ObservedTable::new(make_timestamps(2)).unwrap();
        observed.insert("Up", vec![1.0, 2.0]).unwrap();
        assert_eq!(observed.output("Up").unwrap(), &[1.0, 2.0]);
        assert!(matches!(
            observed.output("Down"),
            Err(ReserveError::MissingColumn(_))
        ));
        assert!(observed.insert("Down", vec![1.0]).is_err());
    }
}
