//! Error types for the spatio-temporal analysis toolkit.
//!
//! Errors carry:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Remediation hints for humans
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 10,
//!   "category": "integrity",
//!   "message": "unit E02000999 appears in observations but not in the population roster",
//!   "context": { "unit": "E02000999", "table": "observations" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A join key present in one table is absent from a required lookup table.
    Integrity,
    /// Malformed input tables, matrices, or model specifications.
    Input,
    /// Configuration file and settings errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the toolkit.
#[derive(Error, Debug)]
pub enum Error {
    // Integrity errors (10-19)
    #[error("unit {unit} appears in {table} but not in the population roster")]
    MissingRosterUnit { unit: String, table: String },

    #[error("duplicate key {key} in {table}")]
    DuplicateKey { table: String, key: String },

    #[error("unit order mismatch at position {position}: expected {expected}, got {actual}")]
    UnitOrderMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    // Input errors (20-29)
    #[error("{file}:{}: {message}", display_line(.line))]
    Parse {
        file: String,
        line: Option<u64>,
        message: String,
    },

    #[error("invalid neighbourhood matrix: {0}")]
    InvalidAdjacency(String),

    #[error("invalid model formula: {0}")]
    InvalidFormula(String),

    #[error("missing model input {column} for unit {unit} at time step {time_step}")]
    MissingModelInput {
        unit: String,
        time_step: u32,
        column: String,
    },

    #[error("{what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    // Configuration errors (30-39)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid sampler settings: {0}")]
    InvalidSettings(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn display_line(line: &Option<u64>) -> String {
    match line {
        Some(l) => l.to_string(),
        None => "?".to_string(),
    }
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Integrity errors
    /// - 20-29: Input errors
    /// - 30-39: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::MissingRosterUnit { .. } => 10,
            Error::DuplicateKey { .. } => 11,
            Error::UnitOrderMismatch { .. } => 12,
            Error::Parse { .. } => 20,
            Error::InvalidAdjacency(_) => 21,
            Error::InvalidFormula(_) => 22,
            Error::MissingModelInput { .. } => 23,
            Error::ShapeMismatch { .. } => 24,
            Error::Config(_) => 30,
            Error::InvalidSettings(_) => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Csv(_) => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingRosterUnit { .. }
            | Error::DuplicateKey { .. }
            | Error::UnitOrderMismatch { .. } => ErrorCategory::Integrity,
            Error::Parse { .. }
            | Error::InvalidAdjacency(_)
            | Error::InvalidFormula(_)
            | Error::MissingModelInput { .. }
            | Error::ShapeMismatch { .. } => ErrorCategory::Input,
            Error::Config(_) | Error::InvalidSettings(_) => ErrorCategory::Config,
            Error::Io(_) | Error::Json(_) | Error::Csv(_) => ErrorCategory::Io,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::MissingRosterUnit { .. } => {
                "Every unit in the observations must have a population roster entry. Check the roster covers the study area."
            }
            Error::DuplicateKey { .. } => {
                "Each (unit, date) key may appear at most once. Aggregate duplicate rows before aligning."
            }
            Error::UnitOrderMismatch { .. } => {
                "The neighbourhood matrix must list units in roster order. Rebuild it from the same polygon set."
            }
            Error::Parse { .. } => "Check the file for malformed rows or missing columns.",
            Error::InvalidAdjacency(_) => {
                "The neighbourhood matrix must be square, symmetric, 0/1 valued, with a zero diagonal."
            }
            Error::InvalidFormula(_) => {
                "Formulas look like 'cases ~ offset(log(population)) + imd'. Check term names and parentheses."
            }
            Error::MissingModelInput { .. } => {
                "Covariates and offsets must be present for every row. Fill or drop the affected units."
            }
            Error::ShapeMismatch { .. } => {
                "Inputs disagree on the number of units or rows. Rebuild them from the same roster."
            }
            Error::Config(_) => "Run 'sta-core config validate' to check the configuration file.",
            Error::InvalidSettings(_) => {
                "Sampler settings need n_sample > burn_in, thin >= 1, and an AR order of 1 or 2."
            }
            Error::Io(_) => "Check the path exists and is readable.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or restore from backup.",
            Error::Csv(_) => "Invalid CSV. Check delimiters and header row.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::MissingRosterUnit { .. } => "Unit Missing From Roster",
            Error::DuplicateKey { .. } => "Duplicate Join Key",
            Error::UnitOrderMismatch { .. } => "Unit Order Mismatch",
            Error::Parse { .. } => "Parse Error",
            Error::InvalidAdjacency(_) => "Invalid Neighbourhood Matrix",
            Error::InvalidFormula(_) => "Invalid Model Formula",
            Error::MissingModelInput { .. } => "Missing Model Input",
            Error::ShapeMismatch { .. } => "Shape Mismatch",
            Error::Config(_) => "Configuration Error",
            Error::InvalidSettings(_) => "Invalid Sampler Settings",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
            Error::Csv(_) => "CSV Error",
        }
    }

    /// Convenience constructor for parse errors.
    pub fn parse(file: impl Into<String>, line: Option<u64>, message: impl Into<String>) -> Self {
        Error::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Remediation hint.
    pub remediation: String,

    /// Additional structured context (e.g., unit code, file).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::MissingRosterUnit { unit, table } => {
                context.insert("unit".to_string(), serde_json::json!(unit));
                context.insert("table".to_string(), serde_json::json!(table));
            }
            Error::DuplicateKey { table, key } => {
                context.insert("table".to_string(), serde_json::json!(table));
                context.insert("key".to_string(), serde_json::json!(key));
            }
            Error::UnitOrderMismatch { position, .. } => {
                context.insert("position".to_string(), serde_json::json!(position));
            }
            Error::Parse { file, line, .. } => {
                context.insert("file".to_string(), serde_json::json!(file));
                if let Some(line) = line {
                    context.insert("line".to_string(), serde_json::json!(line));
                }
            }
            Error::MissingModelInput {
                unit,
                time_step,
                column,
            } => {
                context.insert("unit".to_string(), serde_json::json!(unit));
                context.insert("time_step".to_string(), serde_json::json!(time_step));
                context.insert("column".to_string(), serde_json::json!(column));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            remediation: err.remediation().to_string(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Format for a human reader: headline, reason, and fix.
    pub fn to_human(&self, headline: &str) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            headline, self.message, self.remediation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_categories() {
        let err = Error::MissingRosterUnit {
            unit: "C".to_string(),
            table: "observations".to_string(),
        };
        assert_eq!(err.code(), 10);
        assert_eq!(err.category(), ErrorCategory::Integrity);

        let err = Error::InvalidAdjacency("not square".to_string());
        assert_eq!(err.code(), 21);
        assert_eq!(err.category(), ErrorCategory::Input);

        let err = Error::InvalidSettings("thin".to_string());
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_parse_error_display() {
        let err = Error::parse("roster.csv", Some(4), "population is not an integer");
        assert_eq!(err.to_string(), "roster.csv:4: population is not an integer");

        let err = Error::parse("roster.csv", None, "empty file");
        assert_eq!(err.to_string(), "roster.csv:?: empty file");
    }

    #[test]
    fn test_structured_error_context() {
        let err = Error::MissingRosterUnit {
            unit: "C".to_string(),
            table: "observations".to_string(),
        };
        let structured = StructuredError::from(&err);
        assert_eq!(structured.code, 10);
        assert_eq!(structured.context["unit"], serde_json::json!("C"));

        let json = structured.to_json();
        assert!(json.contains(r#""category":"integrity""#));
    }

    #[test]
    fn test_human_format() {
        let err = Error::InvalidFormula("missing '~'".to_string());
        let human = StructuredError::from(&err).to_human(err.headline());
        assert!(human.starts_with("✗ Invalid Model Formula"));
        assert!(human.contains("Reason: invalid model formula: missing '~'"));
    }
}
