//! Run command implementation.

use crate::cli::{OutputContext, RunArgs};
use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::process::SystemRunner;
use crate::registry::ScenarioRegistry;
use crate::report;
use crate::runner::ScenarioRunner;
use crate::suite::{ParallelismMode, SuiteRunner};
use crate::util::progress::{SuiteProgress, should_show_progress};
use tracing::{debug, info};

/// Map run flags onto config overrides. Boolean flags only override when set.
#[must_use]
pub fn overrides(args: &RunArgs) -> CliOverrides {
    CliOverrides {
        data_dir: args.data_dir.clone(),
        registry: args.registry.clone(),
        jobs: args.jobs,
        fail_fast: args.fail_fast.then_some(true),
        keep_workdirs: args.keep_workdirs.then_some(true),
        timeout_secs: args.timeout,
    }
}

/// Execute the run command. Returns whether every selected scenario passed.
///
/// # Errors
///
/// Returns an error if config or registry loading fails, or a requested
/// scenario id does not exist. Scenario failures are not errors.
pub fn execute(args: &RunArgs, ctx: &OutputContext) -> Result<bool> {
    let config = config::load_config(ctx.config_path.as_deref(), &overrides(args))?;
    debug!(?config, "resolved config");

    let registry = ScenarioRegistry::load_or_builtin(config.registry.as_deref())?;
    let selected = registry.select(&args.ids, args.filter.as_deref())?;
    info!(
        selected = selected.len(),
        registry = registry.len(),
        jobs = config.runner.jobs,
        "running scenarios"
    );

    let process = SystemRunner::new().with_log_dir(config.command_log_dir.clone());
    let suite = SuiteRunner::new(
        ScenarioRunner::new(process, &config),
        ParallelismMode::from_jobs(config.runner.jobs),
    )
    .with_fail_fast(config.runner.fail_fast);

    let progress = SuiteProgress::new(selected.len(), !ctx.json && !ctx.quiet && should_show_progress());
    let result = suite.run_observed(&selected, &progress);
    progress.finish_and_clear();

    if ctx.json {
        let payload = serde_json::to_string_pretty(&report::suite_json(&result))?;
        println!("{payload}");
    } else if ctx.quiet {
        for outcome in result.outcomes.iter().filter(|o| !o.success) {
            eprintln!("{}", report::render_outcome(outcome, ctx.color));
        }
    } else {
        println!("{}", report::render_suite(&result, ctx.color));
    }

    Ok(result.all_passed())
}
