//! Match command implementation.
//!
//! Applies a capture pattern to a saved build log, optionally comparing it
//! positionally against a second log the way a scenario compares outputs.

use crate::cli::{MatchArgs, OutputContext};
use crate::error::{BuildcheckError, Result, ResultExt};
use crate::matcher;
use crate::model::{MatchRule, Pattern};
use serde_json::json;
use std::fs;
use std::path::Path;

fn read_log(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

/// Execute the match command. Returns whether the pattern matched and,
/// with `--against`, whether both capture sequences agree.
///
/// # Errors
///
/// Returns an error if a pattern is invalid or a file can not be read.
pub fn execute(args: &MatchArgs, ctx: &OutputContext) -> Result<bool> {
    let pattern = Pattern::new(&args.pattern)?;
    let text = read_log(&args.file)?;
    let captures = matcher::extract(&pattern, &text);

    let Some(against) = &args.against else {
        if ctx.json {
            let payload = json!({
                "pattern": args.pattern,
                "file": args.file.display().to_string(),
                "matched": !captures.is_empty(),
                "captures": captures,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        } else if !ctx.quiet {
            for (index, capture) in captures.iter().enumerate() {
                println!("[{index}] {capture}");
            }
            println!("{} matches", captures.len());
        }
        return Ok(!captures.is_empty());
    };

    let [other_pattern, other_file] = against.as_slice() else {
        return Err(BuildcheckError::Config(
            "--against takes a pattern and a file".to_string(),
        ));
    };
    let other_pattern = Pattern::new(other_pattern)?;
    let other_text = read_log(Path::new(other_file))?;
    let reference = matcher::extract(&other_pattern, &other_text);

    let check = matcher::evaluate_pair(
        &MatchRule::Positional(pattern),
        &text,
        &MatchRule::Positional(other_pattern),
        &other_text,
    );

    if ctx.json {
        let payload = json!({
            "candidate": captures,
            "reference": reference,
            "check": check,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !ctx.quiet {
        println!("{}", check.describe());
    }
    Ok(check.passed())
}
