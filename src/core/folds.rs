//! Cross-validation hold-out masks.
//!
//! The masks are produced upstream; this type only validates their shape and
//! answers "which timestamps does fold `f` hold out".

use crate::error::{ReserveError, Result};
use std::collections::HashSet;

/// One boolean row per fold over the full timestamp index.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationMasks {
    fold_ids: Vec<String>,
    masks: Vec<Vec<bool>>,
}

impl ValidationMasks {
    pub fn new(fold_ids: Vec<String>, masks: Vec<Vec<bool>>) -> Result<Self> {
        if fold_ids.len() != masks.len() {
            return Err(ReserveError::DimensionMismatch {
                expected: fold_ids.len(),
                got: masks.len(),
            });
        }
        let width = masks.first().map(|m| m.len()).unwrap_or(0);
        for mask in &masks {
            if mask.len() != width {
                return Err(ReserveError::DimensionMismatch {
                    expected: width,
                    got: mask.len(),
                });
            }
        }
        let mut seen = HashSet::new();
        for id in &fold_ids {
            if !seen.insert(id.as_str()) {
                return Err(ReserveError::InvalidParameter(format!(
                    "duplicate fold id '{id}'"
                )));
            }
        }
        Ok(Self { fold_ids, masks })
    }

    /// Folds numbered `0..n` in row order.
    pub fn from_rows(masks: Vec<Vec<bool>>) -> Result<Self> {
        let ids = (0..masks.len()).map(|i| i.to_string()).collect();
        Self::new(ids, masks)
    }

    pub fn n_folds(&self) -> usize {
        self.fold_ids.len()
    }

    /// Length of each mask row.
    pub fn n_timestamps(&self) -> usize {
        self.masks.first().map(|m| m.len()).unwrap_or(0)
    }

    pub fn fold_ids(&self) -> &[String] {
        &self.fold_ids
    }

    pub fn mask(&self, fold: &str) -> Option<&[bool]> {
        self.fold_ids
            .iter()
            .position(|id| id == fold)
            .map(|i| self.masks[i].as_slice())
    }

    /// Positions held out by `fold`, ascending.
    pub fn held_out(&self, fold: &str) -> Result<Vec<usize>> {
        let mask = self
            .mask(fold)
            .ok_or_else(|| ReserveError::MissingFold(fold.to_string()))?;
        Ok(mask
            .iter()
            .enumerate()
            .filter_map(|(i, &held)| held.then_some(i))
            .collect())
    }
}
