//! Contract with the external spatio-temporal sampler.
//!
//! The sampler itself is opaque. This module owns what crosses the
//! boundary:
//! - [`SamplerRequest`]: a validated formula, aligned table, neighbourhood
//!   matrix and MCMC controls
//! - [`Sampler`]: the blocking call
//! - [`SamplerOutput`]: posterior draws and fit statistics
//! - [`SamplerInput`]: a serialisable handoff for samplers run as a
//!   separate process

pub mod formula;
pub mod frame;
pub mod posterior;

pub use formula::{Formula, OffsetTerm, INTERCEPT};
pub use frame::ModelFrame;
pub use posterior::{PosteriorSamples, SampleMatrix};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sta_common::{Error, Result, UnitCode};
use sta_config::{validate_sampler, Family, SamplerSettings};
use sta_math::ParameterSummary;
use tracing::{debug, info};

use crate::adjacency::NeighbourMatrix;
use crate::align::AlignedTable;
use crate::logging::event_names;

/// A fully validated sampler call.
#[derive(Debug, Clone)]
pub struct SamplerRequest<'a> {
    formula: Formula,
    table: &'a AlignedTable,
    frame: ModelFrame,
    neighbours: &'a NeighbourMatrix,
    settings: SamplerSettings,
}

impl<'a> SamplerRequest<'a> {
    /// Validate everything the sampler relies on.
    ///
    /// Checks, in order:
    /// - MCMC controls (burn-in below total draws, thin ≥ 1, at least one
    ///   retained draw, AR order 1 or 2)
    /// - the table is a complete non-empty unit × time grid
    /// - the matrix matches the table's units (dimension, and order when
    ///   labelled) and has no islands
    /// - the formula evaluates against the table
    /// - count families get non-negative integer responses, binomial
    ///   responses not above the population
    pub fn new(
        formula: Formula,
        table: &'a AlignedTable,
        neighbours: &'a NeighbourMatrix,
        settings: SamplerSettings,
    ) -> Result<Self> {
        validate_sampler(&settings).map_err(|e| Error::InvalidSettings(e.to_string()))?;

        if table.is_empty() {
            return Err(Error::ShapeMismatch {
                what: "aligned table rows".to_string(),
                expected: table.n_units().max(1),
                actual: 0,
            });
        }
        let expected_rows = table.n_units() * table.n_time_steps();
        if table.len() != expected_rows {
            return Err(Error::ShapeMismatch {
                what: "aligned table rows".to_string(),
                expected: expected_rows,
                actual: table.len(),
            });
        }

        neighbours.check_unit_order(table.units())?;
        let islands = neighbours.islands();
        if !islands.is_empty() {
            let names: Vec<String> = islands
                .iter()
                .filter_map(|&i| table.units().get(i).map(|u| u.to_string()))
                .collect();
            return Err(Error::InvalidAdjacency(format!(
                "units with no neighbours: {}",
                names.join(", ")
            )));
        }

        let frame = ModelFrame::build(&formula, table)?;
        debug!(
            target: event_names::MODEL_FRAME_BUILT,
            rows = frame.n_rows,
            columns = frame.n_columns(),
            offset = frame.offset.is_some(),
            "model frame built"
        );
        check_responses(&frame, table, settings.family)?;

        info!(
            target: event_names::MODEL_REQUEST_VALIDATED,
            family = %settings.family,
            units = table.n_units(),
            time_steps = table.n_time_steps(),
            edges = neighbours.n_edges(),
            retained_draws = settings.retained_draws(),
            "sampler request validated"
        );

        Ok(SamplerRequest {
            formula,
            table,
            frame,
            neighbours,
            settings,
        })
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn table(&self) -> &AlignedTable {
        self.table
    }

    pub fn frame(&self) -> &ModelFrame {
        &self.frame
    }

    pub fn neighbours(&self) -> &NeighbourMatrix {
        self.neighbours
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    pub fn family(&self) -> Family {
        self.settings.family
    }

    /// Binomial trials: the population of each row.
    pub fn trials(&self) -> Option<Vec<u64>> {
        match self.settings.family {
            Family::Binomial => Some(self.table.rows().iter().map(|r| r.population).collect()),
            _ => None,
        }
    }

    /// Serialisable form of this request.
    pub fn to_input(&self) -> SamplerInput {
        SamplerInput {
            schema_version: sta_common::SCHEMA_VERSION.to_string(),
            formula: self.formula.to_string(),
            family: self.settings.family,
            settings: self.settings.clone(),
            units: self.table.units().to_vec(),
            dates: self.table.time_steps().iter().map(|t| t.date).collect(),
            response: self.frame.response.clone(),
            trials: self.trials(),
            offset: self.frame.offset.clone(),
            design_columns: self.frame.column_names.clone(),
            design: self.frame.design_rows(),
            neighbours: self.neighbours.to_adjacency_list(),
        }
    }
}

fn check_responses(frame: &ModelFrame, table: &AlignedTable, family: Family) -> Result<()> {
    if family == Family::Gaussian {
        return Ok(());
    }
    for (row, value) in table.rows().iter().zip(&frame.response) {
        let Some(v) = *value else { continue };
        let bad = if v < 0.0 || v.fract() != 0.0 {
            Some("a non-negative integer")
        } else if family == Family::Binomial && v > row.population as f64 {
            Some("at most the population")
        } else {
            None
        };
        if let Some(requirement) = bad {
            return Err(Error::InvalidSettings(format!(
                "{} family needs {} response for unit {} at time step {}, got {}",
                family, requirement, row.unit, row.time_step, v
            )));
        }
    }
    Ok(())
}

/// Goodness-of-fit statistics reported by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelFit {
    pub dic: f64,
    pub p_d: f64,
    pub waic: f64,
    pub p_w: f64,
    pub lmpl: f64,
    pub loglikelihood: f64,
}

/// What a sampler returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerOutput {
    pub samples: PosteriorSamples,
    pub fit: ModelFit,
}

/// Coefficient summaries plus fit statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub coefficients: Vec<ParameterSummary>,
    pub fit: ModelFit,
}

impl SamplerOutput {
    pub fn summary(&self) -> Result<ModelSummary> {
        Ok(ModelSummary {
            coefficients: self.samples.summarise(PosteriorSamples::BETA)?,
            fit: self.fit,
        })
    }
}

/// A spatio-temporal MCMC sampler.
///
/// The call blocks until sampling finishes.
pub trait Sampler {
    fn name(&self) -> &str;

    fn sample(&self, request: &SamplerRequest<'_>) -> Result<SamplerOutput>;
}

/// Handoff bundle for a sampler run out of process.
///
/// Row `i` of `response`, `offset` and `design` is unit `i % n` at time
/// step `i / n + 1`, where `n = units.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerInput {
    pub schema_version: String,
    pub formula: String,
    pub family: Family,
    pub settings: SamplerSettings,
    pub units: Vec<UnitCode>,
    pub dates: Vec<NaiveDate>,
    pub response: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trials: Option<Vec<u64>>,
    pub offset: Option<Vec<f64>>,
    pub design_columns: Vec<String>,
    pub design: Vec<Vec<f64>>,
    /// Neighbour positions per unit, 0-based.
    pub neighbours: Vec<Vec<usize>>,
}
