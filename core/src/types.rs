//! Shared primitive types used across the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Index of a 30-minute window within a day, 0..=47.
pub type SliceIndex = u8;

/// Energy in watt-hours.
pub type WattHours = i64;

/// Money in 1e-7 euro units (4-digit price × Wh, or 2-digit fee × 100000).
pub type MicroCost = i64;

/// Number of 30-minute slices in a day.
pub const SLICES_PER_DAY: u8 = 48;

/// End date used for rate rows that are still in force.
pub fn far_future() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Scale from `MicroCost` to euros.
pub const MICRO_COST_PER_EURO: f64 = 10_000_000.0;

/// A computed cost. `Unknown` means no rate row covered the slice; it
/// absorbs every sum it takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Cost {
    Known(MicroCost),
    Unknown,
}

impl Cost {
    pub const ZERO: Cost = Cost::Known(0);

    pub fn is_unknown(&self) -> bool {
        matches!(self, Cost::Unknown)
    }

    pub fn known(&self) -> Option<MicroCost> {
        match self {
            Cost::Known(v) => Some(*v),
            Cost::Unknown  => None,
        }
    }

    pub fn to_euros(&self) -> Option<f64> {
        self.known().map(|v| v as f64 / MICRO_COST_PER_EURO)
    }
}

impl Default for Cost {
    fn default() -> Self {
        Cost::ZERO
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        match (self, rhs) {
            (Cost::Known(a), Cost::Known(b)) => Cost::Known(a + b),
            _ => Cost::Unknown,
        }
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        *self = *self + rhs;
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::ZERO, Add::add)
    }
}

impl std::fmt::Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_euros() {
            Some(eur) => write!(f, "{eur:.2} €"),
            None      => write!(f, "n/a"),
        }
    }
}

/// Format a date the way the store keys it.
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
