//! Test utilities for sta-core.
//!
//! This module provides test infrastructure including:
//! - Common assertions
//! - Fixture loading helpers
//! - Small in-memory datasets
//! - A deterministic mock sampler

use chrono::NaiveDate;
use sta_common::{Result, UnitCode};
use std::path::{Path, PathBuf};

use crate::data::{Observation, Roster, SpatialUnit};
use crate::sampler::{ModelFit, PosteriorSamples, SampleMatrix, Sampler, SamplerOutput, SamplerRequest};

/// Assert that two floating point numbers are approximately equal.
#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr) => {
        $crate::assert_approx_eq!($a, $b, 1e-9_f64)
    };
    ($a:expr, $b:expr, $epsilon:expr) => {{
        let a: f64 = $a;
        let b: f64 = $b;
        let eps: f64 = $epsilon;
        let diff = (a - b).abs();
        if diff > eps {
            panic!(
                "assertion failed: `(left ~= right)` (left: `{}`, right: `{}`, diff: `{}`, epsilon: `{}`)",
                a, b, diff, eps
            );
        }
    }};
}

// ============================================================================
// Fixtures
// ============================================================================

/// Fixture directory relative to crate root.
pub const FIXTURES_DIR: &str = "tests/fixtures";

/// Name of the bundled fixture dataset inside [`FIXTURES_DIR`].
pub const FIXTURE_DATASET: &str = "lattice";

/// Get the path to a test fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join(FIXTURES_DIR).join(name)
}

/// Root of the fixture data store (`<root>/<dataset>/<file>`).
pub fn fixture_store_root() -> PathBuf {
    fixture_path("")
}

/// Load a fixture file as a string.
pub fn load_fixture(name: &str) -> std::io::Result<String> {
    std::fs::read_to_string(fixture_path(name))
}

// ============================================================================
// In-memory datasets
// ============================================================================

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("fixture date")
}

pub fn roster(units: &[(&str, u64)]) -> Roster {
    Roster::new(
        units
            .iter()
            .map(|(code, population)| SpatialUnit {
                code: UnitCode::from(*code),
                population: *population,
            })
            .collect(),
    )
    .expect("fixture roster")
}

pub fn observation(unit: &str, d: &str, cases: Option<u64>, population: Option<u64>) -> Observation {
    Observation {
        unit: UnitCode::from(unit),
        date: date(d),
        cases,
        population,
    }
}

// ============================================================================
// Mock sampler
// ============================================================================

/// Deterministic stand-in for the external MCMC sampler.
///
/// Coefficient draws oscillate around `beta_centre`; fitted-value draws
/// oscillate around the observed response (0 where absent). Fit statistics
/// are fixed.
#[derive(Debug, Clone)]
pub struct MockSampler {
    pub beta_centre: f64,
    pub spread: f64,
}

impl Default for MockSampler {
    fn default() -> Self {
        MockSampler {
            beta_centre: -2.0,
            spread: 0.1,
        }
    }
}

impl MockSampler {
    fn wobble(&self, draw: usize, n_draws: usize) -> f64 {
        let phase = draw as f64 / n_draws.max(1) as f64;
        self.spread * (2.0 * std::f64::consts::PI * 7.0 * phase).sin()
    }
}

impl Sampler for MockSampler {
    fn name(&self) -> &str {
        "mock"
    }

    fn sample(&self, request: &SamplerRequest<'_>) -> Result<SamplerOutput> {
        let n_draws = request.settings().retained_draws() as usize;
        let frame = request.frame();

        let beta: Vec<Vec<f64>> = (0..n_draws)
            .map(|d| {
                (0..frame.n_columns())
                    .map(|_| self.beta_centre + self.wobble(d, n_draws))
                    .collect()
            })
            .collect();
        let fitted: Vec<Vec<f64>> = (0..n_draws)
            .map(|d| {
                frame
                    .response
                    .iter()
                    .map(|y| y.unwrap_or(0.0) + self.wobble(d, n_draws))
                    .collect()
            })
            .collect();

        let fitted_columns = request
            .table()
            .rows()
            .iter()
            .map(|r| format!("{}@{}", r.unit, r.time_step))
            .collect();

        let mut samples = PosteriorSamples::new();
        samples.insert(
            PosteriorSamples::BETA,
            SampleMatrix::from_draws(frame.column_names.clone(), &beta)?,
        );
        samples.insert(
            PosteriorSamples::FITTED,
            SampleMatrix::from_draws(fitted_columns, &fitted)?,
        );

        Ok(SamplerOutput {
            samples,
            fit: ModelFit {
                dic: 250.0,
                p_d: 12.5,
                waic: 255.0,
                p_w: 14.0,
                lmpl: -130.0,
                loglikelihood: -112.5,
            },
        })
    }
}
