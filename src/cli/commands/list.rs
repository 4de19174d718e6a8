//! List command implementation.

use crate::cli::{ListArgs, OutputContext};
use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::registry::ScenarioRegistry;
use crate::report;

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if config or the registry can not be loaded.
pub fn execute(args: &ListArgs, ctx: &OutputContext) -> Result<()> {
    let overrides = CliOverrides {
        registry: args.registry.clone(),
        ..CliOverrides::default()
    };
    let config = config::load_config(ctx.config_path.as_deref(), &overrides)?;
    let registry = ScenarioRegistry::load_or_builtin(config.registry.as_deref())?;
    let scenarios = registry.select(&[], args.filter.as_deref())?;

    if ctx.json {
        let payload = serde_json::to_string_pretty(&report::listing_json(&scenarios))?;
        println!("{payload}");
    } else if !ctx.quiet {
        println!("{}", report::render_listing(&scenarios));
    }
    Ok(())
}
