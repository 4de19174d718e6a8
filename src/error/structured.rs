//! Structured error output for scripted callers.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Context for debugging

use crate::error::BuildcheckError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// Format: `SCREAMING_SNAKE_CASE` for easy parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Config Errors (exit code 2) ===
    ConfigError,
    ConfigParseError,

    // === Registry Errors (exit code 3) ===
    RegistryError,
    InvalidScenario,
    DuplicateScenario,
    UnknownScenario,
    InvalidPattern,

    // === Tool Errors (exit code 4) ===
    ToolNotFound,
    SpawnFailed,

    // === Staging Errors (exit code 5) ===
    StagingFailed,

    // === I/O Errors (exit code 8) ===
    IoError,
    JsonError,
    YamlError,

    // === Internal Errors (exit code 1) ===
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::ConfigParseError => "CONFIG_PARSE_ERROR",
            Self::RegistryError => "REGISTRY_ERROR",
            Self::InvalidScenario => "INVALID_SCENARIO",
            Self::DuplicateScenario => "DUPLICATE_SCENARIO",
            Self::UnknownScenario => "UNKNOWN_SCENARIO",
            Self::InvalidPattern => "INVALID_PATTERN",
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::SpawnFailed => "SPAWN_FAILED",
            Self::StagingFailed => "STAGING_FAILED",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get the exit code for this error category.
    ///
    /// Exit code 1 is shared between internal errors and "a scenario
    /// failed", which is the common case scripts check for.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigError | Self::ConfigParseError => 2,
            Self::RegistryError
            | Self::InvalidScenario
            | Self::DuplicateScenario
            | Self::UnknownScenario
            | Self::InvalidPattern => 3,
            Self::ToolNotFound | Self::SpawnFailed => 4,
            Self::StagingFailed => 5,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `BuildcheckError`.
    #[must_use]
    pub fn from_error(err: &BuildcheckError) -> Self {
        if let BuildcheckError::UnknownScenario { id, known } = err {
            return Self::unknown_scenario(id, known);
        }
        let (code, context) = Self::extract_code_and_context(err);
        Self {
            code,
            message: err.to_string(),
            hint: err.suggestion().map(ToString::to_string),
            context,
        }
    }

    /// Create an unknown-scenario error with similar id suggestions.
    #[must_use]
    pub fn unknown_scenario(searched_id: &str, known_ids: &[String]) -> Self {
        let similar = find_similar_ids(searched_id, known_ids, 3);

        let hint = if similar.is_empty() {
            Some("Run 'buildcheck list' to see available scenarios.".to_string())
        } else if similar.len() == 1 {
            Some(format!("Did you mean '{}'?", similar[0]))
        } else {
            Some(format!("Did you mean one of: {}?", similar.join(", ")))
        };

        Self {
            code: ErrorCode::UnknownScenario,
            message: format!("Unknown scenario: {searched_id}"),
            hint,
            context: Some(json!({
                "searched_id": searched_id,
                "similar_ids": similar,
            })),
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }
        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &BuildcheckError) -> (ErrorCode, Option<Value>) {
        match err {
            BuildcheckError::Config(_) => (ErrorCode::ConfigError, None),
            BuildcheckError::ConfigParse { path, reason } => (
                ErrorCode::ConfigParseError,
                Some(json!({"path": path.display().to_string(), "reason": reason})),
            ),
            BuildcheckError::Registry { .. } => (ErrorCode::RegistryError, None),
            BuildcheckError::InvalidScenario { id, reason } => (
                ErrorCode::InvalidScenario,
                Some(json!({"id": id, "reason": reason})),
            ),
            BuildcheckError::DuplicateScenario { id } => {
                (ErrorCode::DuplicateScenario, Some(json!({"id": id})))
            }
            BuildcheckError::UnknownScenario { id, .. } => {
                (ErrorCode::UnknownScenario, Some(json!({"searched_id": id})))
            }
            BuildcheckError::InvalidPattern { pattern, .. } => {
                (ErrorCode::InvalidPattern, Some(json!({"pattern": pattern})))
            }
            BuildcheckError::ToolNotFound { program } => {
                (ErrorCode::ToolNotFound, Some(json!({"program": program})))
            }
            BuildcheckError::Spawn { program, .. } => {
                (ErrorCode::SpawnFailed, Some(json!({"program": program})))
            }
            BuildcheckError::Staging { path, .. } => (
                ErrorCode::StagingFailed,
                Some(json!({"path": path.display().to_string()})),
            ),
            BuildcheckError::Io(_) => (ErrorCode::IoError, None),
            BuildcheckError::Json(_) => (ErrorCode::JsonError, None),
            BuildcheckError::Yaml(_) => (ErrorCode::YamlError, None),
            BuildcheckError::WithContext { source, .. } => {
                let code = if source.is::<std::io::Error>() {
                    ErrorCode::IoError
                } else if source.is::<serde_json::Error>() {
                    ErrorCode::JsonError
                } else {
                    ErrorCode::InternalError
                };
                (code, None)
            }
            BuildcheckError::Other(_) => (ErrorCode::InternalError, None),
        }
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, a_char) in a.chars().enumerate() {
        let mut current = Vec::with_capacity(b_chars.len() + 1);
        current.push(i + 1);
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != *b_char);
            let value = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
            current.push(value);
        }
        previous = current;
    }

    previous[b_chars.len()]
}

/// Find ids within a small edit distance of `searched`.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max_suggestions: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max_suggestions)
        .map(|(_, id)| id.to_string())
        .collect()
}
