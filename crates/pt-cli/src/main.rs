//! pantheon-test CLI
//!
//! Runs one experiment: starts the tunnel managers, brings up a tunnel per
//! flow, runs the scheme in every tunnel for the configured time and merges
//! the packet logs.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pantheon_test::cli::Args;
use pantheon_test::output::{print_error, print_success, print_summary};
use pt_core::ExperimentResult;
use pt_orchestrator::{Experiment, SystemRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level().into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(&args).await {
        Ok(result) => {
            print_summary(&result.summary());
            print_success(&format!("{} test done", args.cc));
            Ok(())
        }
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args) -> Result<ExperimentResult> {
    let config = args.load_config()?;
    tracing::info!(
        "Testing {} with {} flow(s) for {:?}",
        config.cc,
        config.flows,
        config.runtime
    );

    let experiment = Experiment::new(config, SystemRunner::new())
        .context("Invalid experiment configuration")?;
    let result = experiment
        .run()
        .await
        .with_context(|| format!("{} test failed", args.cc))?;
    Ok(result)
}
