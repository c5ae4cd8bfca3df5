//! Spatio-temporal analysis configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for analysis.json
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation of sampler and display settings
//! - Config snapshots for run provenance

pub mod analysis;
pub mod load;
pub mod resolve;
pub mod validate;

pub use analysis::{
    AnalysisConfig, DatasetLayout, Family, ModelSpec, Palette, RenderOptions, SamplerSettings,
};
pub use load::{load_config, load_config_from_file, ConfigError, ConfigSnapshot, ResolvedConfig};
pub use resolve::{resolve_config_path, ConfigSource};
pub use validate::{
    validate_analysis, validate_model, validate_render, validate_sampler, ValidationError,
    ValidationResult,
};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
