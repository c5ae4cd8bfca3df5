//! Sampler contract tests against the lattice fixture.
//!
//! Uses the deterministic `MockSampler` from `test_utils` in place of the
//! external MCMC engine.

#![cfg(feature = "test-utils")]

use sta_common::{Error, UnitCode};
use sta_config::{Family, SamplerSettings};
use sta_core::adjacency::NeighbourMatrix;
use sta_core::align::{align, AlignedTable};
use sta_core::assert_approx_eq;
use sta_core::compare::{merge_predictions, unit_means};
use sta_core::data::{
    read_covariates, read_neighbour_matrix, read_observations, read_predictions, read_roster,
    DataStore, DirectoryStore,
};
use sta_core::sampler::{Formula, PosteriorSamples, Sampler, SamplerRequest, INTERCEPT};
use sta_core::test_utils::{fixture_store_root, MockSampler, FIXTURE_DATASET};

const FORMULA: &str = "cases ~ offset(log(population)) + imd";

fn store() -> DirectoryStore {
    DirectoryStore::new(fixture_store_root())
}

fn lattice_table() -> AlignedTable {
    let store = store();
    let observations = read_observations(
        store.open(FIXTURE_DATASET, "observations.csv").unwrap(),
        "observations.csv",
    )
    .unwrap();
    let roster = read_roster(store.open(FIXTURE_DATASET, "roster.csv").unwrap(), "roster.csv").unwrap();
    let covariates = read_covariates(
        store.open(FIXTURE_DATASET, "covariates.csv").unwrap(),
        "covariates.csv",
    )
    .unwrap();
    align(&observations, &roster, &covariates).unwrap()
}

fn lattice_matrix() -> NeighbourMatrix {
    read_neighbour_matrix(
        store().open(FIXTURE_DATASET, "adjacency.csv").unwrap(),
        "adjacency.csv",
    )
    .unwrap()
}

fn short_run() -> SamplerSettings {
    SamplerSettings {
        burn_in: 10,
        n_sample: 110,
        thin: 10,
        ..SamplerSettings::default()
    }
}

fn formula() -> Formula {
    FORMULA.parse().unwrap()
}

mod request_validation {
    use super::*;

    #[test]
    fn lattice_request_is_valid() {
        let table = lattice_table();
        let w = lattice_matrix();
        let request = SamplerRequest::new(formula(), &table, &w, short_run()).unwrap();

        assert_eq!(request.family(), Family::Poisson);
        assert_eq!(request.frame().n_rows, 12);
        assert_eq!(
            request.frame().column_names,
            vec![INTERCEPT.to_string(), "imd".to_string()]
        );

        let input = request.to_input();
        assert_eq!(input.formula, FORMULA);
        assert_eq!(input.units.len(), 4);
        assert_eq!(input.dates.len(), 3);
        assert_eq!(input.neighbours[0], vec![1, 2]);
        let offset = input.offset.unwrap();
        assert_approx_eq!(offset[0], 1000f64.ln());
        // U2 at time step 2 has a row but no count.
        assert_eq!(input.response[5], None);
    }

    #[test]
    fn island_unit_is_rejected() {
        let table = lattice_table();
        let units: Vec<UnitCode> = table.units().to_vec();
        let w = NeighbourMatrix::from_rows(
            vec![
                vec![0, 1, 1, 0],
                vec![1, 0, 1, 0],
                vec![1, 1, 0, 0],
                vec![0, 0, 0, 0],
            ],
            Some(units),
        )
        .unwrap();
        let err = SamplerRequest::new(formula(), &table, &w, short_run()).unwrap_err();
        match err {
            Error::InvalidAdjacency(message) => assert!(message.contains("U4")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn matrix_dimension_must_match_units() {
        let table = lattice_table();
        let w = NeighbourMatrix::from_rows(
            vec![vec![0, 1, 1], vec![1, 0, 1], vec![1, 1, 0]],
            None,
        )
        .unwrap();
        let err = SamplerRequest::new(formula(), &table, &w, short_run()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn matrix_labels_must_follow_roster_order() {
        let table = lattice_table();
        let units = ["U2", "U1", "U3", "U4"].iter().map(|u| UnitCode::from(*u)).collect();
        let w = NeighbourMatrix::from_rows(
            vec![
                vec![0, 1, 0, 1],
                vec![1, 0, 1, 0],
                vec![0, 1, 0, 1],
                vec![1, 0, 1, 0],
            ],
            Some(units),
        )
        .unwrap();
        let err = SamplerRequest::new(formula(), &table, &w, short_run()).unwrap_err();
        assert!(matches!(err, Error::UnitOrderMismatch { position: 1, .. }));
    }

    #[test]
    fn burn_in_must_leave_draws() {
        let table = lattice_table();
        let w = lattice_matrix();
        let settings = SamplerSettings {
            burn_in: 500,
            n_sample: 500,
            ..short_run()
        };
        let err = SamplerRequest::new(formula(), &table, &w, settings).unwrap_err();
        assert!(matches!(err, Error::InvalidSettings(_)));
        assert_eq!(err.code(), 31);
    }

    #[test]
    fn unknown_covariate_is_invalid_formula() {
        let table = lattice_table();
        let w = lattice_matrix();
        let formula: Formula = "cases ~ offset(log(population)) + no2".parse().unwrap();
        let err = SamplerRequest::new(formula, &table, &w, short_run()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormula(_)));
    }
}

mod sampling {
    use super::*;

    #[test]
    fn mock_sampler_returns_both_groups() {
        let table = lattice_table();
        let w = lattice_matrix();
        let request = SamplerRequest::new(formula(), &table, &w, short_run()).unwrap();
        let output = MockSampler::default().sample(&request).unwrap();

        let groups: Vec<&str> = output.samples.groups().collect();
        assert_eq!(groups, vec![PosteriorSamples::BETA, PosteriorSamples::FITTED]);
        let beta = output.samples.get(PosteriorSamples::BETA).unwrap();
        assert_eq!(beta.n_draws(), 10);
        assert_eq!(beta.n_columns(), 2);
    }

    #[test]
    fn summary_reports_coefficients_and_fit() {
        let table = lattice_table();
        let w = lattice_matrix();
        let request = SamplerRequest::new(formula(), &table, &w, short_run()).unwrap();
        let summary = MockSampler::default().sample(&request).unwrap().summary().unwrap();

        assert_eq!(summary.coefficients.len(), 2);
        assert_eq!(summary.coefficients[0].name, INTERCEPT);
        assert_approx_eq!(summary.coefficients[0].mean, -2.0, 1e-9);
        assert!(summary.coefficients[0].lower <= summary.coefficients[0].upper);
        assert_eq!(summary.coefficients[1].n_sample, 10);
        assert_eq!(summary.fit.dic, 250.0);
    }

    #[test]
    fn fitted_values_feed_the_comparator() {
        let table = lattice_table();
        let w = lattice_matrix();
        let request = SamplerRequest::new(formula(), &table, &w, short_run()).unwrap();
        let output = MockSampler::default().sample(&request).unwrap();

        let fitted = output.samples.fitted_predictions(&table, "car").unwrap();
        assert_eq!(fitted.len(), table.len());
        let u1 = fitted
            .rows
            .iter()
            .find(|p| p.unit.as_str() == "U1" && p.date == table.rows()[0].date)
            .unwrap();
        assert_approx_eq!(u1.value, 10.0, 1e-9);

        let ml = read_predictions(
            store().open(FIXTURE_DATASET, "predictions_ml.csv").unwrap(),
            "predictions_ml.csv",
            "ml",
        )
        .unwrap();
        let means = unit_means(&merge_predictions(&fitted, &ml).unwrap());
        let order: Vec<&str> = means.means.iter().map(|m| m.unit.as_str()).collect();
        assert_eq!(order, vec!["U1", "U2", "U4"]);
        assert_approx_eq!(means.get("U1").unwrap().left_mean, 11.0, 1e-9);
    }

    #[test]
    fn fitted_group_must_cover_every_row() {
        let table = lattice_table();
        let mut samples = PosteriorSamples::new();
        samples.insert(
            PosteriorSamples::FITTED,
            sta_core::sampler::SampleMatrix::new(vec!["only".to_string()], vec![1.0, 2.0]).unwrap(),
        );
        let err = samples.fitted_predictions(&table, "car").unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 12, actual: 1, .. }));
    }
}
