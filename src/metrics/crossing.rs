//! Quantile crossing counts.
//!
//! A crossing is a timestamp where the prediction for a lower quantile is
//! strictly greater than the prediction for a higher quantile of the same
//! fold and output.

use crate::core::{PredictionTable, Quantile};
use std::collections::BTreeMap;

/// `(fold, output) -> (lower tau, higher tau) -> count`.
pub type CrossingCounts = BTreeMap<(String, String), BTreeMap<(Quantile, Quantile), usize>>;

/// Positions where `lower` exceeds `upper`. Comparisons with `NaN` never count.
pub fn count_crossings(lower: &[f64], upper: &[f64]) -> usize {
    lower
        .iter()
        .zip(upper)
        .filter(|(lo, hi)| lo > hi)
        .count()
}

/// Count crossings for every (fold, output) and every ordered pair of quantiles.
///
/// Pairs are only formed from quantiles that both have a series for the
/// (fold, output) in question.
pub fn quantile_crossings(predictions: &PredictionTable) -> CrossingCounts {
    let taus = predictions.quantiles();
    let mut counts = CrossingCounts::new();

    for (fold, output) in predictions.fold_output_pairs() {
        let mut pairs = BTreeMap::new();
        for (i, &t1) in taus.iter().enumerate() {
            for &t2 in &taus[i + 1..] {
                let (Some(lower), Some(upper)) = (
                    predictions.series(t1, &fold, &output),
                    predictions.series(t2, &fold, &output),
                ) else {
                    continue;
                };
                pairs.insert((t1, t2), count_crossings(lower, upper));
            }
        }
        counts.insert((fold, output), pairs);
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn make_timestamps(n: usize) -> Vec<NaiveDateTime> {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| base + Duration::minutes(15 * i as i64)).collect()
    }

    fn q(tau: f64) -> Quantile {
        Quantile::new(tau).unwrap()
    }

    #[test]
    fn counts_strict_violations_only() {
        assert_eq!(count_crossings(&[1.0, 2.0, 3.0], &[1.0, 1.0, 4.0]), 1);
        assert_eq!(count_crossings(&[f64::NAN, 5.0], &[0.0, f64::NAN]), 0);
    }

    #[test]
    fn ordered_pairs_per_fold_and_output() {
        let mut predictions = PredictionTable::new(make_timestamps(3)).unwrap();
        predictions.insert(q(0.05), "0", "Up", vec![0.0, 0.0, 9.0]).unwrap();
        predictions.insert(q(0.5), "0", "Up", vec![1.0, 1.0, 1.0]).unwrap();
        predictions.insert(q(0.95), "0", "Up", vec![2.0, 0.5, 2.0]).unwrap();

        let counts = quantile_crossings(&predictions);
        let up = &counts[&("0".to_string(), "Up".to_string())];

        assert_eq!(up.len(), 3);
        assert_eq!(up[&(q(0.05), q(0.5))], 1);
        assert_eq!(up[&(q(0.05), q(0.95))], 1);
        assert_eq!(up[&(q(0.5), q(0.95))], 1);
        assert!(!up.contains_key(&(q(0.5), q(0.05))));
    }

    #[test]
    fn monotone_quantiles_never_cross_and_inverted_ones_always_do() {
        let n = 5;
        let mut predictions = PredictionTable::new(make_timestamps(n)).unwrap();
        predictions.insert(q(0.1), "a", "Down", vec![1.0; n]).unwrap();
        predictions.insert(q(0.9), "a", "Down", vec![2.0; n]).unwrap();
        predictions.insert(q(0.1), "b", "Down", vec![3.0; n]).unwrap();
        predictions.insert(q(0.9), "b", "Down", vec![2.0; n]).unwrap();

        let counts = quantile_crossings(&predictions);
        assert_eq!(counts[&("a".to_string(), "Down".to_string())][&(q(0.1), q(0.9))], 0);
        assert_eq!(counts[&("b".to_string(), "Down".to_string())][&(q(0.1), q(0.9))], n);
    }

    #[test]
    fn pairs_need_both_quantiles() {
        let mut predictions = PredictionTable::new(make_timestamps(2)).unwrap();
        predictions.insert(q(0.1), "0", "Up", vec![1.0; 2]).unwrap();
        predictions.insert(q(0.9), "1", "Up", vec![1.0; 2]).unwrap();

        let counts = quantile_crossings(&predictions);
        assert_eq!(counts.len(), 2);
        assert!(counts.values().all(|pairs| pairs.is_empty()));
    }
}
