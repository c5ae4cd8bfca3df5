//! Configuration loading with provenance.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::AnalysisConfig;
use crate::resolve::{resolve_config_path, ConfigSource};
use crate::validate::{validate_analysis, ValidationError};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: AnalysisConfig,
    /// Path to the config file (None if using defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 hash of the file content (None if using defaults).
    pub hash: Option<String>,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    /// Built-in defaults, no file.
    pub fn defaults() -> Self {
        ResolvedConfig {
            config: AnalysisConfig::default(),
            path: None,
            hash: None,
            source: ConfigSource::BuiltinDefault,
        }
    }

    /// Create a config snapshot for run artifacts.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            path: self.path.clone(),
            hash: self.hash.clone(),
            source: self.source.to_string(),
            schema_version: self.config.schema_version.clone(),
        }
    }
}

/// Config snapshot recorded alongside outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub path: Option<PathBuf>,
    pub hash: Option<String>,
    pub source: String,
    pub schema_version: String,
}

/// Load and validate configuration using the standard resolution order.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let (path, source) = resolve_config_path(cli_path);
    let Some(path) = path else {
        return Ok(ResolvedConfig::defaults());
    };

    let (config, hash) = load_config_from_file(&path)?;
    validate_analysis(&config)?;

    Ok(ResolvedConfig {
        config,
        path: Some(path),
        hash: Some(hash),
        source,
    })
}

/// Parse a config file without semantic validation.
///
/// Returns the parsed config and the SHA-256 hash of the raw content.
pub fn load_config_from_file(path: &Path) -> Result<(AnalysisConfig, String), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let hash = compute_hash(&content);

    let config: AnalysisConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok((config, hash))
}

/// SHA-256 hash of content as lowercase hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_is_sha256() {
        assert_eq!(
            compute_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_missing_cli_path_is_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/sta/analysis.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_defaults_snapshot() {
        let snapshot = ResolvedConfig::defaults().snapshot();
        assert!(snapshot.path.is_none());
        assert_eq!(snapshot.source, "builtin default");
        assert!(serde_json::to_string(&snapshot).is_ok());
    }
}
