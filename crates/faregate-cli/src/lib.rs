//! faregate-cli
//!
//! Runs one batch of flight-price acquisition tasks from a TOML batch file
//! and prints a JSON report.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod controller;
pub mod logging;
pub mod retry;
pub mod tasks;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use faregate_core::TaskHandler;
use faregate_core::typed::TypedHandler;
use tracing::info;

use crate::acquisition::{CommandHandler, DryRunHandler, FlightQuery};
use crate::cli::CliArgs;
use crate::config::{BatchConfig, load_and_validate, require_command};
use crate::controller::{BatchController, BatchReport};

/// Entry point used by `main.rs`: load the batch file, expand its task
/// templates against today's date, run it, print the report on stdout.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(&args.config)?;
    let base_dir = Path::new(&args.config).parent().unwrap_or(Path::new("."));
    let holidays = tasks::load_holidays(&cfg, base_dir)
        .with_context(|| format!("loading holidays for {:?}", args.config))?;
    cfg.flight_tasks = tasks::expand(&cfg, &holidays, Local::now().date_naive());
    info!(
        tasks = cfg.flight_tasks.len(),
        holidays = holidays.len(),
        "flight tasks expanded"
    );

    let handler = select_handler(&cfg, args.dry_run)?;

    let report = BatchController::new(cfg, handler).run().await?;
    print_report(&report)
}

fn select_handler(cfg: &BatchConfig, dry_run: bool) -> Result<Arc<dyn TaskHandler>> {
    if dry_run {
        info!("dry run: acquisition command will not be executed");
        return Ok(Arc::new(TypedHandler::<FlightQuery, _>::new(DryRunHandler)));
    }
    let command = require_command(cfg)?;
    Ok(Arc::new(TypedHandler::<FlightQuery, _>::new(CommandHandler::new(command))))
}

fn print_report(report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing batch report")?;
    println!("{json}");
    Ok(())
}
