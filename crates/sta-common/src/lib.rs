//! Spatio-temporal analysis common types, IDs, and errors.
//!
//! This crate provides foundational types shared across sta-core modules:
//! - Spatial unit and time step identity types
//! - Common error types with stable codes
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use id::{TimeStep, UnitCode};
pub use output::OutputFormat;

/// Schema version for serialized payloads.
pub const SCHEMA_VERSION: &str = "1.0.0";
