//! Error types and handling for `buildcheck`.
//!
//! Two kinds of failure exist in this crate and they are kept apart:
//!
//! - `BuildcheckError`: the verifier itself could not do its job (bad
//!   config, unreadable registry, a tool binary that does not exist).
//!   These propagate with `?` and end the process.
//! - `ScenarioFailure` (in `runner`): a scenario ran and did not pass.
//!   Those are data carried by the scenario outcome so a failing scenario
//!   never aborts the rest of a suite.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Accepts `anyhow` errors through `Other`
//! - Provides recovery hints for user-facing errors
//! - Provides structured JSON output for scripted callers

mod context;
mod structured;

pub use context::{OptionExt, ResultExt};
pub use structured::{ErrorCode, StructuredError};

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `buildcheck` operations.
#[derive(Error, Debug)]
pub enum BuildcheckError {
    // === Configuration Errors ===
    /// Configuration value is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A config file exists but could not be parsed.
    #[error("Failed to parse config file '{path}': {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    // === Registry Errors ===
    /// The scenario registry could not be loaded.
    #[error("Registry error: {reason}")]
    Registry { reason: String },

    /// A scenario definition violates its invariants.
    #[error("Invalid scenario '{id}': {reason}")]
    InvalidScenario { id: String, reason: String },

    /// Two scenarios share an identifier.
    #[error("Duplicate scenario id: {id}")]
    DuplicateScenario { id: String },

    /// A requested scenario id is not in the registry.
    #[error("Unknown scenario: {id}")]
    UnknownScenario { id: String, known: Vec<String> },

    /// A match rule pattern failed to compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    // === Tool Errors ===
    /// The program to execute does not exist on PATH.
    #[error("Tool not found: {program}")]
    ToolNotFound { program: String },

    /// The program exists but could not be started or waited on.
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // === Staging Errors ===
    /// Build source could not be staged into the working directory.
    #[error("Staging failed for '{path}': {reason}")]
    Staging { path: PathBuf, reason: String },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Wrapped errors ===
    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildcheckError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigParse { .. }
                | Self::Registry { .. }
                | Self::InvalidScenario { .. }
                | Self::DuplicateScenario { .. }
                | Self::UnknownScenario { .. }
                | Self::InvalidPattern { .. }
                | Self::ToolNotFound { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ToolNotFound { .. } => {
                Some("Install the tool or point the matching *.program config key at it")
            }
            Self::UnknownScenario { .. } => Some("Run: buildcheck list"),
            Self::InvalidPattern { .. } => Some("Check the pattern against Rust regex syntax"),
            Self::InvalidScenario { .. } | Self::DuplicateScenario { .. } => {
                Some("Fix the scenario entry in the registry file")
            }
            Self::ConfigParse { .. } => Some("Check the YAML syntax of the config file"),
            Self::Staging { .. } => Some("Check that data-dir points at the scenario sources"),
            _ => None,
        }
    }

    /// Create an invalid-scenario error.
    #[must_use]
    pub fn invalid_scenario(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScenario {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a staging error for a source path.
    #[must_use]
    pub fn staging(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Staging {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using `BuildcheckError`.
pub type Result<T> = std::result::Result<T, BuildcheckError>;
