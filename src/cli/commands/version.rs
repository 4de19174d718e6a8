//! Version command implementation.

use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    candidate: String,
    reference: String,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };
    let defaults = crate::config::VerifierConfig::default();

    if json {
        let output = VersionOutput {
            version,
            build,
            candidate: defaults.candidate.program,
            reference: defaults.reference.program,
        };
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
        return Ok(());
    }

    println!(
        "buildcheck version {version} ({build}); compares {} against {}",
        defaults.candidate.program, defaults.reference.program
    );
    Ok(())
}
