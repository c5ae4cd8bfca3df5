//! Input datasets: observations, the population roster, and covariates.
//!
//! Loaders for each live in [`tables`]; [`store`] maps dataset names to
//! readable sources.

pub mod store;
pub mod tables;

pub use store::{DataStore, DirectoryStore};
pub use tables::{
    read_covariates, read_neighbour_matrix, read_observations, read_predictions, read_roster,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sta_common::{Error, Result, UnitCode};
use std::collections::HashMap;

/// One reported record for a unit and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub unit: UnitCode,
    pub date: NaiveDate,
    /// Absent when nothing was reported for the period.
    pub cases: Option<u64>,
    /// Absent at intake; filled from the roster during alignment.
    pub population: Option<u64>,
}

/// An areal unit with its population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialUnit {
    pub code: UnitCode,
    pub population: u64,
}

/// The fixed set of study units, in input order.
///
/// Lookups by code go through a hash index.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    units: Vec<SpatialUnit>,
    index: HashMap<UnitCode, usize>,
}

impl Roster {
    /// Build a roster. Duplicate codes are an integrity error.
    pub fn new(units: Vec<SpatialUnit>) -> Result<Self> {
        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.code.clone(), i).is_some() {
                return Err(Error::DuplicateKey {
                    table: "roster".to_string(),
                    key: unit.code.to_string(),
                });
            }
        }
        Ok(Roster { units, index })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[SpatialUnit] {
        &self.units
    }

    pub fn codes(&self) -> impl Iterator<Item = &UnitCode> {
        self.units.iter().map(|u| &u.code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// Roster position of a unit.
    pub fn position(&self, code: &str) -> Option<usize> {
        self.index.get(code).copied()
    }

    pub fn population(&self, code: &str) -> Option<u64> {
        self.position(code).map(|i| self.units[i].population)
    }
}

/// Time-invariant covariates keyed by unit.
#[derive(Debug, Clone, Default)]
pub struct CovariateTable {
    names: Vec<String>,
    records: HashMap<UnitCode, Vec<Option<f64>>>,
}

impl CovariateTable {
    pub fn new(names: Vec<String>) -> Self {
        CovariateTable {
            names,
            records: HashMap::new(),
        }
    }

    /// A table with no columns; aligning against it adds nothing.
    pub fn empty() -> Self {
        CovariateTable::default()
    }

    /// Add one unit's record.
    ///
    /// The record must have one value per column and each unit may appear
    /// once.
    pub fn insert(&mut self, unit: UnitCode, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.names.len() {
            return Err(Error::ShapeMismatch {
                what: format!("covariate record for {}", unit),
                expected: self.names.len(),
                actual: values.len(),
            });
        }
        if self.records.contains_key(&unit) {
            return Err(Error::DuplicateKey {
                table: "covariates".to_string(),
                key: unit.to_string(),
            });
        }
        self.records.insert(unit, values);
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, unit: &str) -> Option<&[Option<f64>]> {
        self.records.get(unit).map(|v| v.as_slice())
    }

    /// Number of unit records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
