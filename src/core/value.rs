//! Missing-aware numeric value.
//!
//! [`Masked`] is either a present `f64` or missing. Every arithmetic operator
//! is lifted so that a missing operand yields a missing result; there is no
//! implicit fill with zero anywhere in this type.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A numeric reading that may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Masked(Option<f64>);

impl Masked {
    /// The missing value.
    pub const MISSING: Masked = Masked(None);

    /// Wrap a present value. `NaN` is treated as missing.
    pub fn present(value: f64) -> Self {
        if value.is_nan() {
            Self::MISSING
        } else {
            Self(Some(value))
        }
    }

    /// Combine a raw value with its validity flag (`true` = usable).
    pub fn from_flagged(value: f64, valid: bool) -> Self {
        if valid {
            Self::present(value)
        } else {
            Self::MISSING
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_missing(self) -> bool {
        self.0.is_none()
    }

    pub fn is_present(self) -> bool {
        self.0.is_some()
    }

    /// Present value or `NaN`, for handing off to float-only consumers.
    pub fn to_f64(self) -> f64 {
        self.0.unwrap_or(f64::NAN)
    }

    /// Apply `f` to the present value.
    pub fn map<F: FnOnce(f64) -> f64>(self, f: F) -> Self {
        match self.0 {
            Some(v) => Self::present(f(v)),
            None => Self::MISSING,
        }
    }

    fn zip_with<F: FnOnce(f64, f64) -> f64>(self, other: Self, f: F) -> Self {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Self::present(f(a, b)),
            _ => Self::MISSING,
        }
    }

    /// Mean of the values, missing if any value is missing or the slice is empty.
    pub fn mean(values: &[Masked]) -> Self {
        if values.is_empty() {
            return Self::MISSING;
        }
        let total: Masked = values.iter().copied().sum();
        total / values.len() as f64
    }
}

impl From<f64> for Masked {
    fn from(value: f64) -> Self {
        Self::present(value)
    }
}

impl From<Option<f64>> for Masked {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::MISSING, Self::present)
    }
}

impl From<Masked> for Option<f64> {
    fn from(value: Masked) -> Self {
        value.0
    }
}

macro_rules! lift_binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for Masked {
            type Output = Masked;

            fn $method(self, rhs: Masked) -> Masked {
                self.zip_with(rhs, |a, b| a $op b)
            }
        }

        impl $trait<f64> for Masked {
            type Output = Masked;

            fn $method(self, rhs: f64) -> Masked {
                self.zip_with(Masked::present(rhs), |a, b| a $op b)
            }
        }
    };
}

lift_binary_op!(Add, add, +);
lift_binary_op!(Sub, sub, -);
lift_binary_op!(Mul, mul, *);
lift_binary_op!(Div, div, /);

impl Neg for Masked {
    type Output = Masked;

    fn neg(self) -> Masked {
        self.map(|v| -v)
    }
}

/// Sums to missing as soon as one term is missing.
impl Sum for Masked {
    fn sum<I: Iterator<Item = Masked>>(iter: I) -> Self {
        iter.fold(Masked::present(0.0), |acc, v| acc + v)
    }
}
