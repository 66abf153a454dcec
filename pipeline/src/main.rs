//! `relpipe` CLI entrypoint.
//!
//! This binary loads `relpipe.toml`, dispatches the requested subcommand, and
//! reports the outcome on stderr. Any error is printed with its source chain
//! and the process exits with status 1.

use clap::Parser;
use log::debug;
use relpipe::cli::{Cli, Command};
use relpipe::config::Config;
use relpipe::error::Result;
use relpipe::output::{
    clean_message, plan_text, release_summary, show_text, version_message, write_stderr_line,
};
use relpipe::pipeline::{PipelineContext, bump_version, clean, plan, run_pipeline, show};
use relpipe::process::SystemCommandExecutor;
use std::error::Error;
use std::io::Write;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let config = Config::load(&cli.config)?;

    match &cli.command {
        Command::Run(args) => {
            let executor = SystemCommandExecutor;
            let context = PipelineContext {
                config: &config,
                executor: &executor,
                quiet: cli.quiet,
            };
            let report = run_pipeline(&context, &args.options(), stderr)?;
            if !cli.quiet {
                write_stderr_line(stderr, "");
                write_stderr_line(stderr, release_summary(&report));
            }
        }
        Command::Plan(args) => {
            write_stderr_line(stderr, plan_text(&plan(&config, &args.options())?));
        }
        Command::Version(args) => {
            let next = bump_version(&config, args.timestamp.as_deref())?;
            write_stderr_line(stderr, version_message(&next));
        }
        Command::Show => write_stderr_line(stderr, show_text(&show(&config)?)),
        Command::Clean => {
            let removed = clean(&config)?;
            if !cli.quiet {
                write_stderr_line(stderr, clean_message(&removed));
            }
        }
    }
    Ok(())
}

/// Routes `log` records to stderr at a level chosen by `-q`/`-v`.
///
/// `RUST_LOG` overrides the flags when set.
fn init_logging(cli: &Cli) {
    let level = log_level(cli);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("relpipe={level}")));
    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
    {
        debug!("keeping the log subscriber already installed: {err}");
    }
}

fn log_level(cli: &Cli) -> &'static str {
    match (cli.quiet, cli.verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            let mut source = err.source();
            while let Some(cause) = source {
                write_stderr_line(stderr, format!("  caused by: {cause}"));
                source = cause.source();
            }
            1
        }
    }
}
