//! Exit codes for the sta-core CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/data errors (recoverable by fixing inputs)
//! - 20-29: Internal and I/O errors

use sta_common::{Error, ErrorCategory};

/// Exit codes for sta-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    // ========================================================================
    // User / Data Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// A join key is missing from a required lookup table
    IntegrityError = 11,

    /// Malformed input table, matrix, geometry, or formula
    InputError = 12,

    /// Invalid configuration
    ConfigError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/data error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::IntegrityError => "ERR_INTEGRITY",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Integrity => ExitCode::IntegrityError,
            ErrorCategory::Input => ExitCode::InputError,
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Io => ExitCode::IoError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::IntegrityError.is_user_error());
        assert!(!ExitCode::IntegrityError.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn test_from_error() {
        let err = Error::MissingRosterUnit {
            unit: "C".to_string(),
            table: "observations".to_string(),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::IntegrityError);
        assert_eq!(
            ExitCode::from(&Error::InvalidFormula("x".to_string())),
            ExitCode::InputError
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::IntegrityError.to_string(), "ERR_INTEGRITY (11)");
    }
}
