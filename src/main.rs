use buildcheck::cli::commands;
use buildcheck::cli::{Cli, Commands, OutputContext};
use buildcheck::logging::init_logging;
use buildcheck::{BuildcheckError, StructuredError};
use clap::Parser;
use std::io::{self, IsTerminal};

/// Exit code when the verifier ran but something did not conform.
const EXIT_MISMATCH: i32 = 1;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let ctx = OutputContext::from_cli(&cli);

    let result = match &cli.command {
        Commands::Run(args) => commands::run::execute(args, &ctx),
        Commands::Diff(args) => commands::diff::execute(args, &ctx),
        Commands::Match(args) => commands::r#match::execute(args, &ctx),
        Commands::List(args) => commands::list::execute(args, &ctx).map(|()| true),
        Commands::Config(args) => commands::config::execute(args, &ctx).map(|()| true),
        Commands::Schema => commands::schema::execute().map(|()| true),
        Commands::Version => commands::version::execute(cli.json).map(|()| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_MISMATCH),
        Err(e) => handle_error(&e, cli.json),
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &BuildcheckError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}
