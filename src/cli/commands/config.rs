//! Config command implementation.
//!
//! Shows the merged configuration, or where each layer is read from.

use crate::cli::{ConfigArgs, ConfigFormat, OutputContext};
use crate::config::{self, CliOverrides, PROJECT_CONFIG_FILE};
use crate::error::Result;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct ConfigPaths {
    user: Option<PathBuf>,
    user_exists: bool,
    project: PathBuf,
    project_exists: bool,
    env_prefix: &'static str,
}

fn config_paths(ctx: &OutputContext) -> ConfigPaths {
    let user = config::user_config_path();
    let project = ctx
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    ConfigPaths {
        user_exists: user.as_ref().is_some_and(|p| p.is_file()),
        user,
        project_exists: project.is_file(),
        project,
        env_prefix: "BUILDCHECK_",
    }
}

/// Execute the config command.
///
/// # Errors
///
/// Returns an error if a config file can not be parsed or a value is
/// invalid.
pub fn execute(args: &ConfigArgs, ctx: &OutputContext) -> Result<()> {
    let as_json = ctx.json || args.format == ConfigFormat::Json;

    if args.paths {
        let paths = config_paths(ctx);
        if as_json {
            println!("{}", serde_json::to_string_pretty(&paths)?);
        } else {
            let mark = |exists: bool| if exists { "" } else { " (missing)" };
            match &paths.user {
                Some(user) => println!("user:    {}{}", user.display(), mark(paths.user_exists)),
                None => println!("user:    <HOME not set>"),
            }
            println!(
                "project: {}{}",
                paths.project.display(),
                mark(paths.project_exists)
            );
            println!("env:     {}*", paths.env_prefix);
        }
        return Ok(());
    }

    let resolved = config::load_config(ctx.config_path.as_deref(), &CliOverrides::default())?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        print!("{}", serde_yaml::to_string(&resolved)?);
    }
    Ok(())
}
