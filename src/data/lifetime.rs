use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{Lifetime, Unit, UnitSummary};
use crate::error::{LoaderError, Result};

// ---------------------------------------------------------------------------
// ThresholdFraction – validated end-of-life fraction
// ---------------------------------------------------------------------------

/// End-of-life threshold as a fraction of a unit's initial capacity.
///
/// Only finite values strictly between 0 and 1 are accepted. There is no
/// default: every caller states the threshold it extracts with.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ThresholdFraction(f64);

impl ThresholdFraction {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(LoaderError::InvalidConfig(format!(
                "threshold fraction must lie in the open interval (0, 1), got {value}"
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Absolute capacity at which a unit with `initial_capacity` reaches end of life.
    pub fn capacity_limit(self, initial_capacity: f64) -> f64 {
        self.0 * initial_capacity
    }
}

impl TryFrom<f64> for ThresholdFraction {
    type Error = LoaderError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ThresholdFraction> for f64 {
    fn from(t: ThresholdFraction) -> f64 {
        t.0
    }
}

impl fmt::Display for ThresholdFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Lifetime extraction
// ---------------------------------------------------------------------------

/// Reduce a unit's cycle history to its [`UnitSummary`].
///
/// Fails with [`LoaderError::InvalidConfig`] when `threshold_fraction` is not
/// in (0, 1).
pub fn extract_lifetime(unit: &Unit, threshold_fraction: f64) -> Result<UnitSummary> {
    let threshold = ThresholdFraction::new(threshold_fraction)?;
    Ok(summarize_unit(unit, threshold))
}

/// Infallible core of [`extract_lifetime`] for an already validated threshold.
///
/// The lifetime is the cycle index of the first record, scanning in order,
/// whose capacity is at or below `threshold × initial_capacity`. A unit that
/// never gets there is censored at its last observed cycle.
pub fn summarize_unit(unit: &Unit, threshold: ThresholdFraction) -> UnitSummary {
    let first = unit.first();
    let last = unit.last();
    let initial_capacity = first.capacity;
    let limit = threshold.capacity_limit(initial_capacity);

    let lifetime = unit
        .records()
        .iter()
        .find(|rec| rec.capacity <= limit)
        .map_or(
            Lifetime::Censored {
                last_observed_cycle: last.cycle_index,
            },
            |rec| Lifetime::Failed {
                cycle: rec.cycle_index,
            },
        );

    let fade_curve = unit
        .records()
        .iter()
        .map(|rec| rec.capacity / initial_capacity)
        .collect();

    let impedance_rise = match (first.impedance, last.impedance) {
        (Some(start), Some(end)) => Some(end - start),
        _ => None,
    };

    UnitSummary {
        unit_id: unit.id().to_string(),
        lifetime,
        initial_capacity,
        final_capacity: last.capacity,
        cycles_observed: unit.cycle_count(),
        fade_curve,
        impedance_rise,
    }
}
