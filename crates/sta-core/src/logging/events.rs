//! Structured event definitions for logging.
//!
//! Every event carries the run ID and the pipeline stage; `JsonlLayer`
//! renders them as one JSON object per line.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading tables, matrices, and geometries from the data store.
    Load,
    /// Building the dense unit × time table.
    Align,
    /// Model frame construction and sampler handoff.
    Model,
    /// Merging prediction tables.
    Compare,
    /// Map output.
    Render,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Align => "align",
            Stage::Model => "model",
            Stage::Compare => "compare",
            Stage::Render => "render",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Load stage
    pub const LOAD_TABLE: &str = "load.table";
    pub const LOAD_MATRIX: &str = "load.matrix";
    pub const LOAD_GEOMETRY: &str = "load.geometry";

    // Align stage
    pub const ALIGN_STARTED: &str = "align.started";
    pub const ALIGN_INTEGRITY_ERROR: &str = "align.integrity_error";
    pub const ALIGN_FINISHED: &str = "align.finished";

    // Model stage
    pub const MODEL_FRAME_BUILT: &str = "model.frame_built";
    pub const MODEL_REQUEST_VALIDATED: &str = "model.request_validated";
    pub const MODEL_INPUT_WRITTEN: &str = "model.input_written";

    // Compare stage
    pub const COMPARE_MERGED: &str = "compare.merged";
    pub const COMPARE_UNIT_MEANS: &str = "compare.unit_means";

    // Render stage
    pub const RENDER_WRITTEN: &str = "render.written";

    // Error events
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Context for generating log events with a consistent run ID.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub dataset: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            dataset: None,
        }
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }
}
