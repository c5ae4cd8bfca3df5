//! Dataset aligner scenarios and grid invariants.
//!
//! Runs the real loaders and aligner on in-memory CSV and on the bundled
//! lattice fixture; no mocks.

use chrono::NaiveDate;
use proptest::prelude::*;
use sta_common::{Error, ErrorCategory, UnitCode};
use sta_core::align::align;
use sta_core::data::{
    read_covariates, read_observations, read_roster, CovariateTable, DataStore, DirectoryStore,
    Observation, Roster, SpatialUnit,
};
use std::path::PathBuf;

fn fixture_store() -> DirectoryStore {
    DirectoryStore::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures"))
}

fn roster_ab() -> Roster {
    read_roster("code,population\nA,100\nB,200\n".as_bytes(), "roster.csv").unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn single_observation_fills_four_row_grid() {
    let observations = read_observations(
        "code,date,cases,population\nA,2020-03-07,10,100\nB,2020-03-14,,\n".as_bytes(),
        "obs.csv",
    )
    .unwrap();
    let table = align(&observations, &roster_ab(), &CovariateTable::empty()).unwrap();

    assert_eq!(table.len(), 4);
    let a1 = table.find("A", 1).unwrap();
    assert_eq!(a1.cases, Some(10));
    assert_eq!(a1.prevalence, Some(0.1));
    assert!((a1.log_prevalence.unwrap() - 0.1f64.ln()).abs() < 1e-12);

    for (unit, step, population) in [("B", 1, 200), ("A", 2, 100), ("B", 2, 200)] {
        let row = table.find(unit, step).unwrap();
        assert_eq!(row.cases, None, "{}@{}", unit, step);
        assert_eq!(row.population, population);
        assert_eq!(row.prevalence, None);
        assert_eq!(row.log_prevalence, None);
    }
}

#[test]
fn unit_outside_roster_is_integrity_error() {
    let observations = read_observations(
        "code,date,cases\nA,2020-03-07,1\nC,2020-03-07,2\n".as_bytes(),
        "obs.csv",
    )
    .unwrap();
    let err = align(&observations, &roster_ab(), &CovariateTable::empty()).unwrap_err();
    match &err {
        Error::MissingRosterUnit { unit, table } => {
            assert_eq!(unit, "C");
            assert_eq!(table, "observations");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.category(), ErrorCategory::Integrity);
}

#[test]
fn aligning_twice_serialises_identically() {
    let observations = read_observations(
        "code,date,cases\nB,2020-03-14,3\nA,2020-03-07,1\nA,2020-03-21,0\n".as_bytes(),
        "obs.csv",
    )
    .unwrap();
    let covariates =
        read_covariates("code,imd\nA,1.5\nB,\n".as_bytes(), "cov.csv").unwrap();
    let first = align(&observations, &roster_ab(), &covariates).unwrap();
    let second = align(&observations, &roster_ab(), &covariates).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn lattice_fixture_aligns_from_store() {
    let store = fixture_store();
    let observations =
        read_observations(store.open("lattice", "observations.csv").unwrap(), "observations.csv").unwrap();
    let roster = read_roster(store.open("lattice", "roster.csv").unwrap(), "roster.csv").unwrap();
    let covariates =
        read_covariates(store.open("lattice", "covariates.csv").unwrap(), "covariates.csv").unwrap();

    let table = align(&observations, &roster, &covariates).unwrap();
    assert_eq!(table.n_units(), 4);
    assert_eq!(table.n_time_steps(), 3);
    assert_eq!(table.len(), 12);
    assert_eq!(table.covariate_names(), &["imd".to_string(), "pm25".to_string()]);

    let stats = table.stats();
    assert_eq!(stats.observed_rows, 9);
    assert_eq!(stats.population_filled, 11);
    // U2@2 has a row but no cases; U3@1 has zero cases.
    assert_eq!(stats.prevalence_defined, 8);

    let u3 = table.find("U3", 1).unwrap();
    assert_eq!(u3.prevalence, Some(0.0));
    assert_eq!(u3.log_prevalence, None);

    // First n rows are time step 1, in roster order.
    let first: Vec<&str> = table.rows()[..4].iter().map(|r| r.unit.as_str()).collect();
    assert_eq!(first, vec!["U1", "U2", "U3", "U4"]);
    assert!(table.rows()[..4].iter().all(|r| r.time_step == 1));
}

// ============================================================================
// Properties
// ============================================================================

fn arb_inputs() -> impl Strategy<Value = (Vec<(String, u64)>, Vec<Observation>)> {
    (1usize..6, 1u32..6).prop_flat_map(|(n_units, n_days)| {
        let populations = prop::collection::vec(0u64..5_000, n_units);
        let cells = prop::collection::vec(
            prop::option::of((prop::option::of(0u64..500), prop::option::of(0u64..5_000))),
            n_units * n_days as usize,
        );
        (populations, cells).prop_map(move |(populations, cells)| {
            let units: Vec<(String, u64)> = populations
                .into_iter()
                .enumerate()
                .map(|(i, p)| (format!("U{}", i), p))
                .collect();
            let start = NaiveDate::from_ymd_opt(2020, 3, 7).unwrap();
            let observations = cells
                .into_iter()
                .enumerate()
                .filter_map(|(k, cell)| {
                    let (cases, population) = cell?;
                    Some(Observation {
                        unit: UnitCode::from(units[k % n_units].0.as_str()),
                        date: start + chrono::Duration::days(7 * (k / n_units) as i64),
                        cases,
                        population,
                    })
                })
                .collect();
            (units, observations)
        })
    })
}

fn build_roster(units: &[(String, u64)]) -> Roster {
    Roster::new(
        units
            .iter()
            .map(|(code, population)| SpatialUnit {
                code: UnitCode::from(code.as_str()),
                population: *population,
            })
            .collect(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn grid_is_complete_and_unique((units, observations) in arb_inputs()) {
        let roster = build_roster(&units);
        let table = align(&observations, &roster, &CovariateTable::empty()).unwrap();

        let mut dates: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
        dates.sort();
        dates.dedup();
        prop_assert_eq!(table.len(), units.len() * dates.len());

        let mut keys: Vec<(String, u32)> = table
            .rows()
            .iter()
            .map(|r| (r.unit.to_string(), r.time_step))
            .collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), table.len());
    }

    #[test]
    fn derived_columns_follow_guards((units, observations) in arb_inputs()) {
        let roster = build_roster(&units);
        let table = align(&observations, &roster, &CovariateTable::empty()).unwrap();

        for (i, row) in table.rows().iter().enumerate() {
            // Time-major, unit-minor ordering.
            prop_assert_eq!(row.unit.as_str(), units[i % units.len()].0.as_str());
            prop_assert_eq!(row.time_step as usize, i / units.len() + 1);

            match (row.cases, row.population) {
                (Some(cases), population) if population > 0 => {
                    let prevalence = row.prevalence.unwrap();
                    prop_assert_eq!(prevalence, cases as f64 / population as f64);
                    match row.log_prevalence {
                        Some(log) => prop_assert!((log - prevalence.ln()).abs() < 1e-12),
                        None => prop_assert_eq!(cases, 0),
                    }
                }
                _ => {
                    prop_assert!(row.prevalence.is_none());
                    prop_assert!(row.log_prevalence.is_none());
                }
            }
        }
    }

    #[test]
    fn unobserved_population_comes_from_roster((units, observations) in arb_inputs()) {
        let roster = build_roster(&units);
        let table = align(&observations, &roster, &CovariateTable::empty()).unwrap();

        for row in table.rows() {
            let observed = observations
                .iter()
                .find(|o| o.unit == row.unit && o.date == row.date)
                .and_then(|o| o.population);
            let expected = observed.or(roster.population(row.unit.as_str())).unwrap();
            prop_assert_eq!(row.population, expected);
        }
    }
}
