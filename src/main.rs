//! qa-relay - Test Run Summary Relay
//!
//! A CLI tool that runs an API test suite, writes report artifacts and relays
//! the run summary to the downstream stages:
//!
//! - Database: one summary row per run, optionally one row per test case
//! - TestRail: a new run with one result per linked case
//! - Email: a summary mail with the HTML report attached
//!
//! Each stage runs only when it is enabled and fully configured. A failing
//! stage never stops the ones after it.
//!
//! ## Usage
//!
//! ```bash
//! # Write an example configuration
//! qa-relay config init
//!
//! # Show which stages would run
//! qa-relay plan --config qa-relay.toml
//!
//! # Run the suite and relay the summary
//! qa-relay run --config qa-relay.toml
//!
//! # Run without touching the database, failing on stage errors
//! qa-relay run --no-db --strict
//! ```
//!
//! ## Exit codes
//!
//! - 0: all tests passed (or were skipped)
//! - 1: at least one test failed
//! - 2: the suite could not run, or the configuration is invalid
//! - 3: tests passed but an enabled stage failed (`--strict` only)

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

mod cli;
mod config;
mod database;
mod executor;
mod http;
mod mail;
mod models;
mod output;
mod pipeline;
mod results;
mod suite;
mod testrail;
mod utils;

use cli::{Args, Command, ConfigAction};
use config::{EnvConfig, PipelineConfig};
use output::{OutputFormat, ResultFormatter};
use pipeline::{Pipeline, PipelineError, StageFlags, StagePlan, EXIT_FATAL, EXIT_OK};
use utils::init_logger;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.effective_log_level());

    let outcome = match args.command {
        Command::Run(run_args) => run_pipeline(run_args).await,
        Command::Plan(plan_args) => show_plan(plan_args),
        Command::Config(config_args) => manage_config(config_args.action),
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };

    std::process::exit(code);
}

/// Locate, load and overlay the configuration
fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, PipelineConfig)> {
    let env = EnvConfig::load();
    let path = PipelineConfig::locate(explicit, env.config_file.as_deref())?;
    info!("Using configuration {}", path.display());

    let mut config =
        PipelineConfig::load(&path).map_err(|e| PipelineError::Config(format!("{e:#}")))?;
    if env.has_any() {
        debug!("Applying QA_RELAY_* environment overrides");
        env.apply(&mut config);
    }
    Ok((path, config))
}

fn formatter(format: OutputFormat, no_color: bool) -> ResultFormatter {
    let formatter = ResultFormatter::new(format);
    if no_color || !std::io::stdout().is_terminal() {
        formatter.no_color()
    } else {
        formatter
    }
}

async fn run_pipeline(args: cli::RunArgs) -> Result<i32> {
    let (_, config) = load_config(args.config.as_deref())?;
    let flags = StageFlags::from(args.stages);

    let pipeline = Pipeline::new(config, &flags)?.with_output_dir(args.output_dir);
    let plan = pipeline.plan();
    info!(
        "{} of {} downstream stages enabled",
        plan.enabled_count(),
        plan.stages().len()
    );
    let report = pipeline.run().await?;

    println!("{}", formatter(args.format, args.no_color).format_report(&report));

    let code = report.exit_code(args.strict);
    if code != EXIT_OK {
        info!("Exiting with status {}", code);
    }
    Ok(code)
}

fn show_plan(args: cli::PlanArgs) -> Result<i32> {
    let (_, config) = load_config(args.config.as_deref())?;
    config.validate()?;

    let plan = StagePlan::resolve(&config, &StageFlags::from(args.stages));
    println!("{}", formatter(args.format, args.no_color).format_plan(&plan));
    Ok(EXIT_OK)
}

fn manage_config(action: ConfigAction) -> Result<i32> {
    match action {
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            PipelineConfig::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        ConfigAction::Validate { path } => {
            let (path, config) = load_config(path.as_deref())?;
            if let Err(e) = config.validate() {
                println!("✗ Configuration file is invalid: {}", path.display());
                println!("  Error: {e}");
                return Err(e.into());
            }

            println!("✓ Configuration file is valid: {}", path.display());
            let plan = StagePlan::resolve(&config, &StageFlags::default());
            print!("\n{plan}");
        }

        ConfigAction::Show { path } => {
            let (_, config) = load_config(path.as_deref())?;
            let output =
                toml::to_string_pretty(&config.masked()).context("Failed to serialize config")?;
            println!("{output}");
        }
    }

    Ok(EXIT_OK)
}
