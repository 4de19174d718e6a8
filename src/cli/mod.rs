//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{IsTerminal, stdout};
use std::path::PathBuf;

pub mod commands;

/// Conformance checker for image build tools
#[derive(Parser, Debug)]
#[command(name = "buildcheck", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project config file (default: ./buildcheck.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Append JSON-formatted logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build scenarios with both tools and compare the results
    Run(RunArgs),

    /// List scenarios in the registry
    List(ListArgs),

    /// Structurally compare two image metadata documents
    Diff(DiffArgs),

    /// Extract pattern captures from a build log
    Match(MatchArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),

    /// Print the JSON Schema of the registry file format
    Schema,

    /// Show version information
    Version,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Scenario ids to run (default: all)
    pub ids: Vec<String>,

    /// Registry file (default: built-in corpus)
    #[arg(long, value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Directory holding scenario build sources
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Run only scenarios whose id contains this text
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,

    /// Scenarios to run at once
    #[arg(long, short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Stop starting scenarios after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Keep staging directories for inspection
    #[arg(long)]
    pub keep_workdirs: bool,

    /// Per-command timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ListArgs {
    /// Registry file (default: built-in corpus)
    #[arg(long, value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Only list scenarios whose id contains this text
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    /// Authoritative document (JSON; an `inspect` array is reduced to its first element)
    pub reference: PathBuf,

    /// Document compared against the reference
    pub candidate: PathBuf,

    /// Additional key to ignore (bare name or dotted path); repeatable
    #[arg(long = "ignore", value_name = "KEY")]
    pub ignore: Vec<String>,

    /// Do not apply the configured ignored keys
    #[arg(long)]
    pub no_default_ignores: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    /// Regular expression; group 1 is captured
    pub pattern: String,

    /// File to search
    pub file: PathBuf,

    /// Second pattern and file to compare positionally against
    #[arg(long, num_args = 2, value_names = ["PATTERN", "FILE"])]
    pub against: Option<Vec<String>>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Output format (--json implies json)
    #[arg(long, value_enum, default_value_t)]
    pub format: ConfigFormat,

    /// Show config file paths instead of values
    #[arg(long)]
    pub paths: bool,
}

/// How command output should be rendered.
#[derive(Debug, Clone)]
pub struct OutputContext {
    pub json: bool,
    pub quiet: bool,
    pub color: bool,
    pub config_path: Option<PathBuf>,
}

impl OutputContext {
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        let color = !cli.no_color
            && std::env::var_os("NO_COLOR").is_none()
            && stdout().is_terminal();
        Self {
            json: cli.json,
            quiet: cli.quiet,
            color,
            config_path: cli.config.clone(),
        }
    }

    /// Plain context for tests and embedding.
    #[must_use]
    pub const fn plain(json: bool) -> Self {
        Self {
            json,
            quiet: false,
            color: false,
            config_path: None,
        }
    }
}
