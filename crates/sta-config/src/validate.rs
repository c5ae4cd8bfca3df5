//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::analysis::{AnalysisConfig, ModelSpec, RenderOptions, SamplerSettings};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 32,
            ValidationError::InvalidValue { .. } => 33,
            ValidationError::VersionMismatch { .. } => 34,
        }
    }
}

/// Validate a complete analysis configuration.
pub fn validate_analysis(config: &AnalysisConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_sampler(&config.sampler)?;
    validate_model(&config.model)?;
    validate_render(&config.render)?;

    if config.datasets.unit_property.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "datasets.unit_property".to_string(),
            message: "Must not be empty".to_string(),
        });
    }

    Ok(())
}

/// Validate MCMC control parameters.
pub fn validate_sampler(settings: &SamplerSettings) -> ValidationResult<()> {
    if settings.thin == 0 {
        return Err(ValidationError::InvalidValue {
            field: "sampler.thin".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    if settings.n_sample <= settings.burn_in {
        return Err(ValidationError::InvalidValue {
            field: "sampler.n_sample".to_string(),
            message: format!(
                "Must exceed burn_in ({}), got {}",
                settings.burn_in, settings.n_sample
            ),
        });
    }

    if settings.retained_draws() == 0 {
        return Err(ValidationError::SemanticError(format!(
            "No draws retained: (n_sample - burn_in) / thin = ({} - {}) / {} rounds to 0",
            settings.n_sample, settings.burn_in, settings.thin
        )));
    }

    if !matches!(settings.ar_order, 1 | 2) {
        return Err(ValidationError::InvalidValue {
            field: "sampler.ar_order".to_string(),
            message: format!("Must be 1 or 2, got {}", settings.ar_order),
        });
    }

    Ok(())
}

/// Validate the model specification (shape only; terms are checked against
/// the data when the model frame is built).
pub fn validate_model(model: &ModelSpec) -> ValidationResult<()> {
    let formula = model.formula.trim();
    if formula.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "model.formula".to_string(),
            message: "Must not be empty".to_string(),
        });
    }
    if formula.matches('~').count() != 1 {
        return Err(ValidationError::InvalidValue {
            field: "model.formula".to_string(),
            message: format!("Must contain exactly one '~', got '{}'", formula),
        });
    }
    Ok(())
}

/// Validate map display options.
pub fn validate_render(render: &RenderOptions) -> ValidationResult<()> {
    if !(0.0..=1.0).contains(&render.fill_opacity) {
        return Err(ValidationError::InvalidValue {
            field: "render.fill_opacity".to_string(),
            message: format!("Must be in [0, 1], got {}", render.fill_opacity),
        });
    }

    if render.outline_colour.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "render.outline_colour".to_string(),
            message: "Must not be empty".to_string(),
        });
    }

    Ok(())
}
