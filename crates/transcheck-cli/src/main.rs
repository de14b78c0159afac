//! transcheck - verification harness for a live transliteration UI
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Allow for tests"
    )
)]

use clap::Parser as _;
use std::io::stderr;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};
use transcheck_harness::{TimingData, TimingLayer};

use cli::{Cli, Commands};

mod cli;
mod handlers;

/// Every case passed, or nothing needed running.
const EXIT_OK: u8 = 0;
/// At least one case failed.
const EXIT_FAILURES: u8 = 1;
/// The run could not start.
const EXIT_SETUP: u8 = 2;

/// Logs go to stderr so stdout carries only reports.
fn init_tracing() -> Arc<Mutex<TimingData>> {
    let (timing_layer, timing_data) = TimingLayer::new();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "transcheck=info".into()))
        .with(fmt::layer().with_writer(stderr).with_target(false))
        .with(timing_layer)
        .init();
    timing_data
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let timing_data = init_tracing();

    let outcome = match cli.command {
        Commands::Run(args) => handlers::handle_run(&args, &timing_data).await,
        Commands::List { fixtures, suite } => {
            handlers::handle_list(fixtures.as_deref(), suite).map(|()| true)
        }
        Commands::Config { config } => handlers::handle_config(config.as_deref()).map(|()| true),
    };

    match outcome {
        Ok(true) => ExitCode::from(EXIT_OK),
        Ok(false) => ExitCode::from(EXIT_FAILURES),
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::from(EXIT_SETUP)
        }
    }
}
