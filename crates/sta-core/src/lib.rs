//! Spatio-Temporal Analysis Core Library
//!
//! This library provides:
//! - Dataset loading (observations, roster, covariates, polygons, matrices)
//! - The dataset aligner producing the dense unit × time table
//! - Model frames and the contract with the external MCMC sampler
//! - Prediction comparison and choropleth rendering
//! - Exit codes, logging and payload formatting for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod adjacency;
pub mod align;
pub mod compare;
pub mod data;
pub mod exit_codes;
pub mod geometry;
pub mod logging;
pub mod output;
pub mod render;
pub mod sampler;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
