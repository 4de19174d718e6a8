//! Schema command implementation.

use crate::error::Result;
use crate::registry::RegistryFile;

/// Print the JSON Schema for registry files.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute() -> Result<()> {
    let schema = schemars::schema_for!(RegistryFile);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
