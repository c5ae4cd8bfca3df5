//! Dataset alignment: sparse observations onto the dense unit × time grid.
//!
//! The aligned table has exactly one row per (unit, time step). Rows are
//! ordered time-major, unit-minor, with units in roster order, so the
//! first `n` rows are time step 1. This is the layout the spatio-temporal
//! sampler expects.
//!
//! Procedure:
//! 1. Validate join keys (every observed unit is in the roster, no
//!    repeated (unit, date) keys). Nothing is produced on failure.
//! 2. Derive time steps from the distinct observation dates.
//! 3. Build the grid and left-join observations and covariates.
//! 4. Fill absent populations from the roster.
//! 5. Compute guarded prevalence and log prevalence.

use chrono::NaiveDate;
use serde::Serialize;
use sta_common::{Error, Result, TimeStep, UnitCode};
use sta_math::{log_prevalence, prevalence};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::data::{CovariateTable, Observation, Roster};
use crate::logging::event_names;

/// One cell of the unit × time grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub unit: UnitCode,
    /// 1-based time step index.
    pub time_step: u32,
    pub date: NaiveDate,
    /// Absent when the unit reported nothing for this period.
    pub cases: Option<u64>,
    /// Always present after the fill pass.
    pub population: u64,
    pub prevalence: Option<f64>,
    pub log_prevalence: Option<f64>,
    /// One value per covariate column, in column order.
    pub covariates: Vec<Option<f64>>,
}

/// Counters describing an alignment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AlignmentStats {
    pub n_units: usize,
    pub n_time_steps: usize,
    pub rows: usize,
    /// Grid cells matched to an observation.
    pub observed_rows: usize,
    /// Grid cells whose population came from the roster.
    pub population_filled: usize,
    pub prevalence_defined: usize,
}

/// The aligned grid. Built once by [`align`]; there are no mutators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedTable {
    units: Vec<UnitCode>,
    time_steps: Vec<TimeStep>,
    covariate_names: Vec<String>,
    rows: Vec<AlignedRow>,
    stats: AlignmentStats,
}

impl AlignedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_units(&self) -> usize {
        self.units.len()
    }

    pub fn n_time_steps(&self) -> usize {
        self.time_steps.len()
    }

    /// Units in roster order.
    pub fn units(&self) -> &[UnitCode] {
        &self.units
    }

    pub fn time_steps(&self) -> &[TimeStep] {
        &self.time_steps
    }

    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn stats(&self) -> &AlignmentStats {
        &self.stats
    }

    /// Row for the unit at roster position `unit_idx` and the 0-based time
    /// step position `step_idx`.
    pub fn get(&self, unit_idx: usize, step_idx: usize) -> Option<&AlignedRow> {
        if unit_idx >= self.units.len() || step_idx >= self.time_steps.len() {
            return None;
        }
        self.rows.get(step_idx * self.units.len() + unit_idx)
    }

    /// Row for a unit code and a 1-based time step index.
    pub fn find(&self, unit: &str, time_step: u32) -> Option<&AlignedRow> {
        let unit_idx = self.units.iter().position(|u| u.as_str() == unit)?;
        let step_idx = (time_step as usize).checked_sub(1)?;
        self.get(unit_idx, step_idx)
    }

    /// Index of a covariate column by name.
    pub fn covariate_index(&self, name: &str) -> Option<usize> {
        self.covariate_names.iter().position(|n| n == name)
    }
}

/// Align observations and covariates onto the roster × time grid.
///
/// Fails with an integrity error, before building anything, when an
/// observation names a unit missing from the roster or when two
/// observations share a (unit, date) key.
pub fn align(
    observations: &[Observation],
    roster: &Roster,
    covariates: &CovariateTable,
) -> Result<AlignedTable> {
    debug!(
        target: event_names::ALIGN_STARTED,
        observations = observations.len(),
        units = roster.len(),
        covariates = covariates.names().len(),
        "aligning observations"
    );

    let observed = index_observations(observations, roster)?;
    let time_steps = TimeStep::from_dates(observations.iter().map(|o| o.date));

    let n_units = roster.len();
    let mut stats = AlignmentStats {
        n_units,
        n_time_steps: time_steps.len(),
        rows: n_units * time_steps.len(),
        ..AlignmentStats::default()
    };

    let missing_covariates = vec![None; covariates.names().len()];
    let mut rows = Vec::with_capacity(stats.rows);
    for step in &time_steps {
        for unit in roster.units() {
            let obs = observed.get(&(unit.code.as_str(), step.date));
            if obs.is_some() {
                stats.observed_rows += 1;
            }
            let cases = obs.and_then(|o| o.cases);
            let population = match obs.and_then(|o| o.population) {
                Some(p) => p,
                None => {
                    stats.population_filled += 1;
                    unit.population
                }
            };
            let prev = prevalence(cases, Some(population));
            if prev.is_some() {
                stats.prevalence_defined += 1;
            }
            let unit_covariates = covariates
                .get(unit.code.as_str())
                .map(|values| values.to_vec())
                .unwrap_or_else(|| missing_covariates.clone());

            rows.push(AlignedRow {
                unit: unit.code.clone(),
                time_step: step.index,
                date: step.date,
                cases,
                population,
                prevalence: prev,
                log_prevalence: log_prevalence(prev),
                covariates: unit_covariates,
            });
        }
    }

    info!(
        target: event_names::ALIGN_FINISHED,
        rows = stats.rows,
        units = stats.n_units,
        time_steps = stats.n_time_steps,
        observed = stats.observed_rows,
        population_filled = stats.population_filled,
        prevalence_defined = stats.prevalence_defined,
        "aligned table built"
    );

    Ok(AlignedTable {
        units: roster.codes().cloned().collect(),
        time_steps,
        covariate_names: covariates.names().to_vec(),
        rows,
        stats,
    })
}

fn index_observations<'a>(
    observations: &'a [Observation],
    roster: &Roster,
) -> Result<HashMap<(&'a str, NaiveDate), &'a Observation>> {
    let mut index = HashMap::with_capacity(observations.len());
    for obs in observations {
        if !roster.contains(obs.unit.as_str()) {
            warn!(
                target: event_names::ALIGN_INTEGRITY_ERROR,
                unit = %obs.unit,
                date = %obs.date,
                "observation unit missing from roster"
            );
            return Err(Error::MissingRosterUnit {
                unit: obs.unit.to_string(),
                table: "observations".to_string(),
            });
        }
        if index.insert((obs.unit.as_str(), obs.date), obs).is_some() {
            warn!(
                target: event_names::ALIGN_INTEGRITY_ERROR,
                unit = %obs.unit,
                date = %obs.date,
                "duplicate observation key"
            );
            return Err(Error::DuplicateKey {
                table: "observations".to_string(),
                key: format!("{}@{}", obs.unit, obs.date),
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SpatialUnit;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn roster(units: &[(&str, u64)]) -> Roster {
        Roster::new(
            units
                .iter()
                .map(|(code, population)| SpatialUnit {
                    code: UnitCode::from(*code),
                    population: *population,
                })
                .collect(),
        )
        .unwrap()
    }

    fn obs(unit: &str, d: &str, cases: Option<u64>, population: Option<u64>) -> Observation {
        Observation {
            unit: UnitCode::from(unit),
            date: date(d),
            cases,
            population,
        }
    }

    #[test]
    fn test_grid_order_is_time_major() {
        let roster = roster(&[("A", 100), ("B", 200)]);
        let observations = vec![
            obs("B", "2020-03-14", Some(4), None),
            obs("A", "2020-03-07", Some(10), Some(100)),
        ];
        let table = align(&observations, &roster, &CovariateTable::empty()).unwrap();

        let keys: Vec<(&str, u32)> = table
            .rows()
            .iter()
            .map(|r| (r.unit.as_str(), r.time_step))
            .collect();
        assert_eq!(keys, vec![("A", 1), ("B", 1), ("A", 2), ("B", 2)]);
        assert_eq!(table.get(1, 1).map(|r| r.cases), Some(Some(4)));
        assert_eq!(table.find("B", 2).map(|r| r.population), Some(200));
        assert!(table.get(2, 0).is_none());
        assert!(table.find("A", 0).is_none());
    }

    #[test]
    fn test_zero_cases_have_no_log() {
        let roster = roster(&[("A", 100)]);
        let observations = vec![obs("A", "2020-03-07", Some(0), None)];
        let table = align(&observations, &roster, &CovariateTable::empty()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.prevalence, Some(0.0));
        assert_eq!(row.log_prevalence, None);
    }

    #[test]
    fn test_zero_population_guarded() {
        let roster = roster(&[("A", 0)]);
        let observations = vec![obs("A", "2020-03-07", Some(3), None)];
        let table = align(&observations, &roster, &CovariateTable::empty()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.population, 0);
        assert_eq!(row.prevalence, None);
        assert_eq!(row.log_prevalence, None);
        assert_eq!(table.stats().prevalence_defined, 0);
    }

    #[test]
    fn test_duplicate_observation_key_rejected() {
        let roster = roster(&[("A", 100)]);
        let observations = vec![
            obs("A", "2020-03-07", Some(1), None),
            obs("A", "2020-03-07", Some(2), None),
        ];
        let err = align(&observations, &roster, &CovariateTable::empty()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
        assert_eq!(err.code(), 11);
    }

    #[test]
    fn test_covariates_broadcast_across_time() {
        let roster = roster(&[("A", 100), ("B", 200)]);
        let mut covariates = CovariateTable::new(vec!["imd".to_string()]);
        covariates
            .insert(UnitCode::from("A"), vec![Some(12.5)])
            .unwrap();
        // Units outside the roster are ignored.
        covariates
            .insert(UnitCode::from("Z"), vec![Some(1.0)])
            .unwrap();
        let observations = vec![
            obs("A", "2020-03-07", Some(1), None),
            obs("A", "2020-03-14", Some(2), None),
        ];
        let table = align(&observations, &roster, &covariates).unwrap();

        assert_eq!(table.covariate_index("imd"), Some(0));
        for row in table.rows() {
            match row.unit.as_str() {
                "A" => assert_eq!(row.covariates, vec![Some(12.5)]),
                _ => assert_eq!(row.covariates, vec![None]),
            }
        }
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_stats() {
        let roster = roster(&[("A", 100), ("B", 200)]);
        let observations = vec![
            obs("A", "2020-03-07", Some(10), Some(100)),
            obs("B", "2020-03-07", None, None),
        ];
        let table = align(&observations, &roster, &CovariateTable::empty()).unwrap();
        let stats = table.stats();
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.observed_rows, 2);
        assert_eq!(stats.population_filled, 1);
        assert_eq!(stats.prevalence_defined, 1);
    }

    #[test]
    fn test_no_observations_gives_empty_grid() {
        let roster = roster(&[("A", 100)]);
        let table = align(&[], &roster, &CovariateTable::empty()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.n_units(), 1);
        assert_eq!(table.n_time_steps(), 0);
    }
}
