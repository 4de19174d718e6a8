//! Diff command implementation.

use crate::cli::{DiffArgs, OutputContext};
use crate::config::{self, CliOverrides};
use crate::diff::{self, DiffVerdict, IgnoredKeys};
use crate::error::{Result, ResultExt};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tracing::debug;

fn read_document(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(diff::unwrap_inspect(value))
}

/// Ignored keys for a diff run: configured keys unless disabled, plus extras.
///
/// # Errors
///
/// Returns an error if config loading fails.
pub fn ignored_keys(args: &DiffArgs, ctx: &OutputContext) -> Result<IgnoredKeys> {
    let mut ignored = if args.no_default_ignores {
        IgnoredKeys::none()
    } else {
        config::load_config(ctx.config_path.as_deref(), &CliOverrides::default())?.ignored_keys
    };
    ignored.extend(&args.ignore);
    Ok(ignored)
}

/// Compare two documents. Returns whether they match.
///
/// # Errors
///
/// Returns an error if either file can not be read or is not JSON.
pub fn execute(args: &DiffArgs, ctx: &OutputContext) -> Result<bool> {
    let reference = read_document(&args.reference)?;
    let candidate = read_document(&args.candidate)?;
    let ignored = ignored_keys(args, ctx)?;
    debug!(ignored = ?ignored.entries(), "comparing documents");

    let verdict: DiffVerdict = diff::diff(&reference, &candidate, &ignored);

    if ctx.json {
        let payload = json!({
            "reference": args.reference.display().to_string(),
            "candidate": args.candidate.display().to_string(),
            "ignored_keys": ignored.entries(),
            "verdict": verdict,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !ctx.quiet {
        println!("{}", verdict.render());
    }
    Ok(verdict.all_match())
}
