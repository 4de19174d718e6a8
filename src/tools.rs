//! Command surface of the candidate, reference and inspection tools.
//!
//! Only assembles command lines and parses tool output; running them is
//! the `ProcessRunner`'s job.

use crate::config::{ToolConfig, VerifierConfig};
use crate::diff::unwrap_inspect;
use crate::error::{BuildcheckError, Result};
use crate::matcher::Side;
use crate::process::Invocation;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Assembles invocations for one configuration.
#[derive(Debug, Clone)]
pub struct ToolSet {
    candidate: ToolConfig,
    reference: ToolConfig,
    inspector: String,
    transfer: Option<Vec<String>>,
    timeout: Duration,
}

impl ToolSet {
    #[must_use]
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            candidate: config.candidate.clone(),
            reference: config.reference.clone(),
            inspector: config.inspector.clone(),
            transfer: config.transfer.clone(),
            timeout: config.runner.timeout(),
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn tool(&self, side: Side) -> &ToolConfig {
        match side {
            Side::Candidate => &self.candidate,
            Side::Reference => &self.reference,
        }
    }

    /// `<program> <build args> -t <tag> [extra...] <context>`.
    ///
    /// The context is always the last argument.
    #[must_use]
    pub fn build(
        &self,
        side: Side,
        scope: &str,
        tag: &str,
        extra_flags: &[String],
        context: &Path,
    ) -> Invocation {
        let tool = self.tool(side);
        let mut args = tool.build_args.clone();
        args.push("-t".to_string());
        args.push(tag.to_string());
        args.extend(extra_flags.iter().cloned());
        args.push(context.to_string_lossy().into_owned());
        Invocation::new(&tool.program, args)
            .with_label(format!("{scope}-{side}-build"))
            .in_dir(context)
            .with_timeout(self.timeout)
    }

    /// Command that moves the candidate image where the inspector can see it.
    #[must_use]
    pub fn transfer(&self, scope: &str, tag: &str, context: &Path) -> Option<Invocation> {
        let template = self.transfer.as_ref()?;
        let context = context.to_string_lossy();
        let mut parts = template
            .iter()
            .map(|part| part.replace("{tag}", tag).replace("{context}", &context));
        let program = parts.next()?;
        Some(
            Invocation::new(program, parts)
                .with_label(format!("{scope}-transfer"))
                .with_timeout(self.timeout),
        )
    }

    #[must_use]
    pub fn inspect(&self, scope: &str, side: Side, tag: &str) -> Invocation {
        Invocation::new(&self.inspector, ["inspect", tag])
            .with_label(format!("{scope}-{side}-inspect"))
            .with_timeout(self.timeout)
    }

    /// Image existence query: local ids whose reference matches `tag`.
    #[must_use]
    pub fn image_ids(&self, scope: &str, tag: &str) -> Invocation {
        Invocation::new(
            &self.inspector,
            ["images".to_string(), "-f".to_string(), format!("reference={tag}"), "-q".to_string()],
        )
        .with_label(format!("{scope}-images"))
        .with_timeout(self.timeout)
    }

    #[must_use]
    pub fn remove_image(&self, scope: &str, side: Side, tag: &str) -> Invocation {
        Invocation::new(&self.inspector, ["rmi", "-f", tag])
            .with_label(format!("{scope}-{side}-rmi"))
            .with_timeout(self.timeout)
    }

    /// With a transfer step the candidate image exists twice; this removes
    /// the copy in the candidate tool's own store.
    #[must_use]
    pub fn remove_candidate_copy(&self, scope: &str, tag: &str) -> Option<Invocation> {
        self.transfer.as_ref()?;
        Some(
            Invocation::new(&self.candidate.program, ["rmi", "-f", tag])
                .with_label(format!("{scope}-candidate-store-rmi"))
                .with_timeout(self.timeout),
        )
    }
}

/// Parse `inspect` output into the single metadata document.
///
/// # Errors
///
/// Returns `Json` if the output is not JSON, and `Other` if it holds no
/// document.
pub fn parse_inspect(stdout: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(stdout.trim())?;
    match unwrap_inspect(value) {
        Value::Object(map) => Ok(Value::Object(map)),
        Value::Array(_) => Err(BuildcheckError::Other(anyhow::anyhow!(
            "inspect returned no image document"
        ))),
        other => Err(BuildcheckError::Other(anyhow::anyhow!(
            "inspect returned a {} instead of an object",
            json_kind(&other)
        ))),
    }
}

/// One id per non-empty line, deduplicated, in order.
#[must_use]
pub fn parse_image_ids(stdout: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !ids.iter().any(|id| id == line) {
            ids.push(line.to_string());
        }
    }
    ids
}

/// Whether the build log names one of the resolved ids.
///
/// Short ids printed by `images -q` are prefixes of the full digest, so
/// either form in the log counts.
#[must_use]
pub fn log_mentions_id(log: &str, ids: &[String]) -> bool {
    ids.iter().any(|id| {
        let short = id.strip_prefix("sha256:").unwrap_or(id);
        !short.is_empty() && log.contains(short)
    })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
