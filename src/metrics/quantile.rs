//! Quantile-forecast metrics.
//!
//! All functions drop a position when either the observed or the predicted
//! value is `NaN` (except where noted) and return `NaN` when nothing is left
//! to aggregate. Infinite predictions are kept.

use crate::error::{ReserveError, Result};
use chrono::NaiveDateTime;
use std::fmt;

/// Names of the per-sample metrics, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Coverage,
    Requirement,
    Closeness,
    Exceedance,
    MaxExceedance,
    PinballLoss,
    ReserveRampRate,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Coverage,
        Metric::Requirement,
        Metric::Closeness,
        Metric::Exceedance,
        Metric::MaxExceedance,
        Metric::PinballLoss,
        Metric::ReserveRampRate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Coverage => "coverage",
            Metric::Requirement => "requirement",
            Metric::Closeness => "closeness",
            Metric::Exceedance => "exceedance",
            Metric::MaxExceedance => "max_exceedance",
            Metric::PinballLoss => "pinball_loss",
            Metric::ReserveRampRate => "reserve_ramp_rate",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every metric for one (quantile, fold, output) combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileMetrics {
    /// Fraction of observations at or below the prediction.
    pub coverage: f64,
    /// Mean predicted value.
    pub requirement: f64,
    /// Mean absolute error.
    pub closeness: f64,
    /// Mean one-sided violation in the quantile's tail direction.
    pub exceedance: f64,
    /// Worst one-sided violation.
    pub max_exceedance: f64,
    pub pinball_loss: f64,
    /// Mean absolute change of the prediction per hour.
    pub reserve_ramp_rate: f64,
}

impl QuantileMetrics {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Coverage => self.coverage,
            Metric::Requirement => self.requirement,
            Metric::Closeness => self.closeness,
            Metric::Exceedance => self.exceedance,
            Metric::MaxExceedance => self.max_exceedance,
            Metric::PinballLoss => self.pinball_loss,
            Metric::ReserveRampRate => self.reserve_ramp_rate,
        }
    }

    /// Build from a per-metric function.
    pub fn from_fn<F: FnMut(Metric) -> f64>(mut f: F) -> Self {
        Self {
            coverage: f(Metric::Coverage),
            requirement: f(Metric::Requirement),
            closeness: f(Metric::Closeness),
            exceedance: f(Metric::Exceedance),
            max_exceedance: f(Metric::MaxExceedance),
            pinball_loss: f(Metric::PinballLoss),
            reserve_ramp_rate: f(Metric::ReserveRampRate),
        }
    }
}

/// Calculate every metric for aligned observed/predicted series.
///
/// # Arguments
/// * `observed` - Observed values
/// * `predicted` - Predicted quantile values
/// * `timestamps` - Timestamps of each position, used for ramp rates
/// * `tau` - Target quantile of the prediction
pub fn calculate_quantile_metrics(
    observed: &[f64],
    predicted: &[f64],
    timestamps: &[NaiveDateTime],
    tau: f64,
) -> Result<QuantileMetrics> {
    if observed.is_empty() || predicted.is_empty() {
        return Err(ReserveError::EmptyData);
    }
    for len in [predicted.len(), timestamps.len()] {
        if len != observed.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: observed.len(),
                got: len,
            });
        }
    }

    Ok(QuantileMetrics {
        coverage: coverage(observed, predicted),
        requirement: requirement(predicted),
        closeness: closeness(observed, predicted),
        exceedance: exceedance(observed, predicted, tau),
        max_exceedance: max_exceedance(observed, predicted, tau),
        pinball_loss: pinball_loss(observed, predicted, tau),
        reserve_ramp_rate: reserve_ramp_rate(timestamps, observed, predicted),
    })
}

fn paired<'a>(observed: &'a [f64], predicted: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    observed
        .iter()
        .zip(predicted)
        .filter(|(o, p)| !o.is_nan() && !p.is_nan())
        .map(|(&o, &p)| (o, p))
}

fn paired_mask<'a>(observed: &'a [f64], predicted: &'a [f64]) -> impl Iterator<Item = bool> + 'a {
    observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| !o.is_nan() && !p.is_nan())
}

fn mean_of<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn aligned(observed: &[f64], predicted: &[f64]) -> bool {
    observed.len() == predicted.len()
}

/// Fraction of positions where the observation does not exceed the prediction.
pub fn coverage(observed: &[f64], predicted: &[f64]) -> f64 {
    if !aligned(observed, predicted) {
        return f64::NAN;
    }
    mean_of(paired(observed, predicted).map(|(o, p)| if o <= p { 1.0 } else { 0.0 }))
}

/// Mean prediction. Only predicted `NaN`s are dropped.
pub fn requirement(predicted: &[f64]) -> f64 {
    mean_of(predicted.iter().copied().filter(|p| !p.is_nan()))
}

/// Mean absolute error.
pub fn closeness(observed: &[f64], predicted: &[f64]) -> f64 {
    if !aligned(observed, predicted) {
        return f64::NAN;
    }
    mean_of(paired(observed, predicted).map(|(o, p)| (o - p).abs()))
}

/// Mean of `observed - predicted` over violations in the tail of `tau`.
///
/// Upper quantiles (tau >= 0.5) average over `observed > predicted`; lower
/// quantiles average over `observed < predicted`, giving a negative value.
pub fn exceedance(observed: &[f64], predicted: &[f64], tau: f64) -> f64 {
    if !aligned(observed, predicted) {
        return f64::NAN;
    }
    let upper = tau >= 0.5;
    mean_of(
        paired(observed, predicted)
            .filter(|&(o, p)| if upper { o > p } else { o < p })
            .map(|(o, p)| o - p),
    )
}

/// Largest `observed - predicted` for upper quantiles, smallest for lower ones.
pub fn max_exceedance(observed: &[f64], predicted: &[f64], tau: f64) -> f64 {
    if !aligned(observed, predicted) {
        return f64::NAN;
    }
    let diffs = paired(observed, predicted).map(|(o, p)| o - p);
    let extreme = if tau >= 0.5 {
        diffs.fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
    } else {
        diffs.fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
    };
    extreme.unwrap_or(f64::NAN)
}

/// Mean quantile (pinball) loss.
pub fn pinball_loss(observed: &[f64], predicted: &[f64], tau: f64) -> f64 {
    if !aligned(observed, predicted) {
        return f64::NAN;
    }
    mean_of(
        paired(observed, predicted).map(|(o, p)| ((1.0 - tau) * (p - o)).max(tau * (o - p))),
    )
}

/// Mean absolute change of the prediction per hour between consecutive
/// positions where both series are present, using the actual timestamp
/// spacing.
pub fn reserve_ramp_rate(
    timestamps: &[NaiveDateTime],
    observed: &[f64],
    predicted: &[f64],
) -> f64 {
    if timestamps.len() != predicted.len() || !aligned(observed, predicted) {
        return f64::NAN;
    }
    let points: Vec<(NaiveDateTime, f64)> = timestamps
        .iter()
        .zip(paired_mask(observed, predicted))
        .zip(predicted)
        .filter(|((_, keep), _)| *keep)
        .map(|((&t, _), &p)| (t, p))
        .collect();

    mean_of(points.windows(2).filter_map(|w| {
        let hours = (w[1].0 - w[0].0).num_seconds() as f64 / 3600.0;
        (hours > 0.0).then(|| (w[1].1 - w[0].1).abs() / hours)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn quarter_hours(n: usize) -> Vec<NaiveDateTime> {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| base + Duration::minutes(15 * i as i64)).collect()
    }

    #[test]
    fn coverage_bounds() {
        let y = vec![1.0, -2.0, 3.5, 10.0];
        assert_relative_eq!(coverage(&y, &y), 1.0);
        assert_relative_eq!(coverage(&y, &[f64::INFINITY; 4]), 1.0);
        assert_relative_eq!(coverage(&y, &[f64::NEG_INFINITY; 4]), 0.0);
    }

    #[test]
    fn coverage_drops_nan_pairs() {
        let observed = vec![1.0, 2.0, f64::NAN, 4.0];
        let predicted = vec![2.0, 1.0, 0.0, f64::NAN];
        assert_relative_eq!(coverage(&observed, &predicted), 0.5);
    }

    #[test]
    fn requirement_ignores_observed_nans() {
        let observed = vec![f64::NAN, f64::NAN, 1.0];
        let predicted = vec![2.0, 4.0, f64::NAN];
        assert_relative_eq!(requirement(&predicted), 3.0);
        assert!(closeness(&observed, &predicted).is_nan());
    }

    #[test]
    fn closeness_is_mae() {
        assert_relative_eq!(closeness(&[1.0, 2.0, 3.0], &[1.5, 2.5, 2.0]), 2.0 / 3.0);
    }

    #[test]
    fn exceedance_is_tau_directional() {
        let observed = vec![5.0, 1.0, 3.0, 0.0];
        let predicted = vec![3.0, 2.0, 3.0, 4.0];
        // Differences: 2, -1, 0, -4.
        assert_relative_eq!(exceedance(&observed, &predicted, 0.95), 2.0);
        assert_relative_eq!(exceedance(&observed, &predicted, 0.05), -2.5);
        assert_relative_eq!(max_exceedance(&observed, &predicted, 0.95), 2.0);
        assert_relative_eq!(max_exceedance(&observed, &predicted, 0.05), -4.0);
        // tau = 0.5 counts as an upper quantile.
        assert_relative_eq!(exceedance(&observed, &predicted, 0.5), 2.0);
    }

    #[test]
    fn exceedance_without_violations_is_nan() {
        assert!(exceedance(&[1.0, 2.0], &[5.0, 5.0], 0.95).is_nan());
        assert!(max_exceedance(&[], &[], 0.95).is_nan());
    }

    #[test]
    fn pinball_loss_known_values() {
        // Under-prediction by 2 at tau 0.9 costs 1.8; over-prediction by 2 costs 0.2.
        assert_relative_eq!(pinball_loss(&[3.0], &[1.0], 0.9), 1.8, epsilon = 1e-12);
        assert_relative_eq!(pinball_loss(&[1.0], &[3.0], 0.9), 0.2, epsilon = 1e-12);
        assert_relative_eq!(
            pinball_loss(&[3.0, 1.0], &[1.0, 3.0], 0.9),
            1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(pinball_loss(&[1.0, 2.0], &[1.0, 2.0], 0.3), 0.0);
    }

    #[test]
    fn ramp_rate_uses_actual_spacing() {
        let mut ts = quarter_hours(3);
        // Second gap is an hour instead of 15 minutes.
        ts[2] = ts[1] + Duration::hours(1);
        let predicted = vec![0.0, 1.0, 3.0];
        // 1 / 0.25 = 4 per hour, 2 / 1 = 2 per hour.
        assert_relative_eq!(
            reserve_ramp_rate(&ts, &[0.0; 3], &predicted),
            3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn ramp_rate_skips_missing_predictions() {
        let ts = quarter_hours(3);
        let observed = vec![1.0; 3];
        let predicted = vec![0.0, f64::NAN, 1.0];
        // Bridges the gap: 1 over 0.5 hours.
        assert_relative_eq!(
            reserve_ramp_rate(&ts, &observed, &predicted),
            2.0,
            epsilon = 1e-12
        );
        assert!(reserve_ramp_rate(&ts[..1], &[1.0], &[1.0]).is_nan());
    }

    #[test]
    fn ramp_rate_skips_missing_observations() {
        let ts = quarter_hours(3);
        let observed = vec![1.0, f64::NAN, 3.0];
        let predicted = vec![0.0, 10.0, 0.0];
        assert_relative_eq!(reserve_ramp_rate(&ts, &observed, &predicted), 0.0);

        let m = calculate_quantile_metrics(&observed, &predicted, &ts, 0.9).unwrap();
        assert_relative_eq!(m.reserve_ramp_rate, 0.0);
        // Requirement still sees the prediction at the unobserved position.
        assert_relative_eq!(m.requirement, 10.0 / 3.0);
    }

    #[test]
    fn calculate_checks_shapes() {
        let ts = quarter_hours(3);
        assert!(matches!(
            calculate_quantile_metrics(&[], &[], &[], 0.5),
            Err(ReserveError::EmptyData)
        ));
        assert!(matches!(
            calculate_quantile_metrics(&[1.0, 2.0, 3.0], &[1.0], &ts, 0.5),
            Err(ReserveError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            calculate_quantile_metrics(&[1.0, 2.0], &[1.0, 2.0], &ts, 0.5),
            Err(ReserveError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn calculate_fills_every_metric() {
        let ts = quarter_hours(4);
        let observed = vec![1.0, 2.0, 3.0, 4.0];
        let predicted = vec![2.0, 2.0, 2.0, 2.0];
        let m = calculate_quantile_metrics(&observed, &predicted, &ts, 0.9).unwrap();

        assert_relative_eq!(m.coverage, 0.5);
        assert_relative_eq!(m.requirement, 2.0);
        assert_relative_eq!(m.closeness, 1.0);
        assert_relative_eq!(m.exceedance, 1.5);
        assert_relative_eq!(m.max_exceedance, 2.0);
        assert_relative_eq!(m.reserve_ramp_rate, 0.0);
        assert_relative_eq!(m.get(Metric::PinballLoss), m.pinball_loss);
    }

    #[test]
    fn metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_name(metric.name()), Some(metric));
        }
        assert_eq!(Metric::from_name("rmse"), None);
    }
}
