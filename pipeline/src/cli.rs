//! CLI argument definitions for `relpipe`.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::DEFAULT_CONFIG_FILE;
use crate::pipeline::RunOptions;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Build, sign, package, and publish a release.
#[derive(Parser, Debug)]
#[command(name = "relpipe")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build, sign, package, and publish a release.\n\n",
    "relpipe bumps the persisted build number, rewrites each module ",
    "descriptor's file list and version, compiles modules in dependency order ",
    "for every platform variant, signs the output, merges the per-module ",
    "descriptors, and zips a versioned archive per variant. The archives and ",
    "signed artifacts are then force-pushed to a release repository.\n\n",
    "Every tool path, timeout, variant, and module comes from relpipe.toml.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build and publish every variant:\n",
    "    $ relpipe run\n\n",
    "  Build one variant without publishing:\n",
    "    $ relpipe run --variant bb45 --skip-publish\n\n",
    "  Preview the next build:\n",
    "    $ relpipe plan\n\n",
    "  Show the recorded build and descriptor versions:\n",
    "    $ relpipe show",
))]
pub struct Cli {
    /// Configuration file; its directory is the project root.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: Utf8PathBuf,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the full pipeline.
    Run(RunArgs),

    /// Show what a run would do without changing anything.
    Plan(PlanArgs),

    /// Bump the build number only.
    Version(VersionArgs),

    /// Print the recorded build and each descriptor's version.
    Show,

    /// Remove the build root and dist directory.
    Clean,
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Build only this variant (can be repeated).
    #[arg(long = "variant", value_name = "NAME")]
    pub variants: Vec<String>,

    /// Stop after packaging; do not push to the release repository.
    #[arg(long)]
    pub skip_publish: bool,

    /// Record this UTC time in the build manifest instead of the clock.
    #[arg(long, value_name = "YYYY-MM-DDThh:mm:ssZ")]
    pub timestamp: Option<String>,
}

impl RunArgs {
    /// Pipeline options for these arguments.
    #[must_use]
    pub fn options(&self) -> RunOptions {
        RunOptions {
            variants: self.variants.clone(),
            skip_publish: self.skip_publish,
            timestamp: self.timestamp.clone(),
        }
    }
}

/// Arguments for `plan`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PlanArgs {
    /// Plan only this variant (can be repeated).
    #[arg(long = "variant", value_name = "NAME")]
    pub variants: Vec<String>,

    /// Plan without publishing.
    #[arg(long)]
    pub skip_publish: bool,
}

impl PlanArgs {
    /// Pipeline options for these arguments.
    #[must_use]
    pub fn options(&self) -> RunOptions {
        RunOptions {
            variants: self.variants.clone(),
            skip_publish: self.skip_publish,
            timestamp: None,
        }
    }
}

/// Arguments for `version`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct VersionArgs {
    /// Record this UTC time in the build manifest instead of the clock.
    #[arg(long, value_name = "YYYY-MM-DDThh:mm:ssZ")]
    pub timestamp: Option<String>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
