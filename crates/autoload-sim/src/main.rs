//! Binary entrypoint for `autoload-sim`.
//!
//! Builds an in-memory document from a scenario file, enables the
//! autoloader, applies the scripted mutations, and prints every settled
//! batch followed by a registry summary.
use std::{path::PathBuf, process::ExitCode, time::Duration};

use autoload::{AutoloadConfig, BatchOrigin, BatchReport, LoadOutcome, memory::MemoryRegistry};
use clap::Parser;
use logging::LogArgs;
use tokio::{runtime::Builder, task, time::timeout};
use tracing::debug;

/// Scenario parsing and application.
mod scenario;

use crate::scenario::{Error, Scenario, World};

/// Scheduler yields after each step so the pump sees delivered batches.
const STEP_YIELDS: usize = 4;

#[derive(Parser, Debug)]
#[command(
    name = "autoload-sim",
    about = "Run the autoloader against a scripted in-memory document",
    version
)]
/// Command-line interface for the `autoload-sim` binary.
struct Cli {
    /// Scenario file (RON)
    #[arg(value_name = "SCENARIO")]
    scenario: PathBuf,

    /// Loader configuration file (RON); overrides the scenario's `config`
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Quiet period that ends the run once no batch has settled (milliseconds)
    #[arg(long, value_name = "MS", default_value_t = 100)]
    settle_ms: u64,

    /// Logging controls
    #[command(flatten)]
    log: LogArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log.spec());

    let rt = match Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    match rt.block_on(run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Load the scenario, drive the loader, and print results.
async fn run(cli: &Cli) -> Result<(), Error> {
    let scenario = Scenario::load(&cli.scenario)?;
    let config = match &cli.config {
        Some(path) => AutoloadConfig::load_from_path(path)?,
        None => scenario.config.clone().unwrap_or_default(),
    };
    config.validate()?;

    let mut world = World::build(&scenario, config);
    let initial = world.autoloader.enable().await?;
    print_report(&initial);

    let mut reports = world.autoloader.reports();
    for (idx, step) in scenario.steps.iter().enumerate() {
        world.apply(idx, step)?;
        for _ in 0..STEP_YIELDS {
            task::yield_now().await;
        }
    }
    world.document.flush();

    let settle = Duration::from_millis(cli.settle_ms);
    while let Ok(Ok(report)) = timeout(settle, reports.recv()).await {
        print_report(&report);
    }
    debug!("scenario settled");

    print_summary(&world.registry);
    world.autoloader.disable_async().await;
    Ok(())
}

/// Print one line per task in a settled batch.
fn print_report(report: &BatchReport) {
    let origin = match report.origin {
        BatchOrigin::Initial => "initial",
        BatchOrigin::Mutation => "mutation",
    };
    for outcome in report.outcomes.iter() {
        match outcome {
            LoadOutcome::Registered { name, identifier } => {
                println!("[{origin}] {name} -> {identifier}: registered");
            }
            LoadOutcome::Failed(failure) => {
                println!(
                    "[{origin}] {} -> {}: {failure} ({})",
                    failure.name, failure.identifier, failure.cause
                );
            }
        }
    }
}

/// Print registrations and logged errors.
fn print_summary(registry: &MemoryRegistry) {
    println!("registered: {}", registry.registered_names().join(", "));
    let errors = registry.errors();
    println!("errors: {}", errors.len());
    for err in errors {
        println!("  {}: {}", err.message, err.causes.join("; "));
    }
}
