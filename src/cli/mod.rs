//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;
use crate::pipeline::StageFlags;
use crate::utils::LogLevel;

/// Run an API test suite and relay its summary
#[derive(Parser, Debug)]
#[command(name = "qa-relay")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Run an API test suite and relay the summary to a database, TestRail and email")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LogLevel,
}

impl Args {
    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level.raised_by(self.verbose)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the suite and dispatch the summary to every enabled stage
    Run(RunArgs),

    /// Show which stages would run, without running anything
    Plan(PlanArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Stage disable flags shared by `run` and `plan`
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct StageArgs {
    /// Skip the database stage
    #[arg(long)]
    pub no_db: bool,

    /// Skip the TestRail stage
    #[arg(long)]
    pub no_testrail: bool,

    /// Skip the email stage
    #[arg(long)]
    pub no_email: bool,
}

impl From<StageArgs> for StageFlags {
    fn from(args: StageArgs) -> Self {
        StageFlags {
            no_db: args.no_db,
            no_testrail: args.no_testrail,
            no_email: args.no_email,
        }
    }
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for report artifacts (overrides suite_info.output_dir)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub stages: StageArgs,

    /// Exit with status 3 when tests pass but an enabled stage failed
    #[arg(long)]
    pub strict: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub stages: StageArgs,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "qa-relay.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check a configuration file and print the stage plan
    Validate {
        /// Configuration file (default: search the standard locations)
        path: Option<PathBuf>,
    },

    /// Print the effective configuration with secrets masked
    Show {
        /// Configuration file (default: search the standard locations)
        path: Option<PathBuf>,
    },
}
