//! Spatial unit and time step identity types.
//!
//! A row of an aligned table is uniquely identified by the
//! (unit, time step) pair.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Areal unit code (e.g. an MSOA or census tract identifier).
///
/// Codes are opaque; equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitCode(pub String);

impl UnitCode {
    pub fn new(code: impl Into<String>) -> Self {
        UnitCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UnitCode {
    fn from(code: &str) -> Self {
        UnitCode(code.to_string())
    }
}

impl From<String> for UnitCode {
    fn from(code: String) -> Self {
        UnitCode(code)
    }
}

impl Borrow<str> for UnitCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One discrete period of the study, in date order.
///
/// `index` is 1-based: the earliest date present in the observations is
/// time step 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeStep {
    pub index: u32,
    pub date: NaiveDate,
}

impl TimeStep {
    /// Derive time steps from a set of dates: distinct, sorted ascending.
    pub fn from_dates<I>(dates: I) -> Vec<TimeStep>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut distinct: Vec<NaiveDate> = dates.into_iter().collect();
        distinct.sort_unstable();
        distinct.dedup();
        distinct
            .into_iter()
            .enumerate()
            .map(|(i, date)| TimeStep {
                index: i as u32 + 1,
                date,
            })
            .collect()
    }
}

impl fmt::Display for TimeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index, self.date)
    }
}
