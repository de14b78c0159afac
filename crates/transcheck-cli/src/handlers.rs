//! Command handlers for CLI operations

use anyhow::{Context as _, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use transcheck_core::{FixtureSet, HarnessConfig};
use transcheck_harness::{ChromiumSessionFactory, ScenarioRunner, TimingData};

use crate::cli::{RunArgs, SuiteArg};

fn load_fixtures(dir: Option<&Path>) -> Result<FixtureSet> {
    match dir {
        Some(dir) => FixtureSet::load_dir(dir)
            .with_context(|| format!("Failed to load fixtures from {}", dir.display())),
        None => FixtureSet::builtin().context("Built-in fixtures are invalid"),
    }
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    let config = HarnessConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_owned(),
    })?;
    Ok(config)
}

/// Run the selected cases; `Ok(false)` means at least one case failed.
///
/// # Errors
/// Returns an error if configuration, fixtures or the browser cannot be set up
pub async fn handle_run(args: &RunArgs, timing_data: &Arc<Mutex<TimingData>>) -> Result<bool> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    let fixtures = load_fixtures(args.fixtures.as_deref())?;
    let suites = args.suite.suites();
    let selected = fixtures.select(&suites, args.filter.as_deref());
    if selected.is_empty() {
        tracing::warn!("No cases match the selection");
        return Ok(true);
    }

    let factory = ChromiumSessionFactory::launch(&config)
        .await
        .context("Failed to launch Chromium")?;
    tracing::info!("Testing {}", config.site_url);
    let runner = ScenarioRunner::new(factory, &config);
    let report = runner.run_entries(&selected).await;
    if let Err(error) = runner.into_factory().shutdown().await {
        tracing::warn!("Browser did not shut down cleanly: {error}");
    }

    #[allow(clippy::print_stdout, reason = "Report output")]
    {
        print!("{}", report.render_text());
    }

    if let Some(path) = &args.report_json {
        let json = report.to_json().context("Failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!("Wrote JSON report to {}", path.display());
    }

    if args.timings {
        let summary = timing_data
            .lock()
            .map_err(|err| anyhow::anyhow!("Timing data lock poisoned: {err}"))?
            .render_summary();
        #[allow(clippy::print_stdout, reason = "Timing output")]
        {
            print!("\n{summary}");
        }
    }

    Ok(report.passed)
}

/// Print one line per selected case.
///
/// # Errors
/// Returns an error if the fixtures cannot be loaded
pub fn handle_list(fixture_dir: Option<&Path>, suite: SuiteArg) -> Result<()> {
    let fixtures = load_fixtures(fixture_dir)?;
    let mut out = String::new();
    for entry in fixtures.select(&suite.suites(), None) {
        let flag = if entry.review_note().is_some() {
            "  [needs review]"
        } else {
            ""
        };
        let _ignored = writeln!(
            out,
            "{:<14} {:<11} {:<30} {}{flag}",
            entry.id(),
            entry.suite().name(),
            entry.category(),
            entry.label()
        );
    }
    #[allow(clippy::print_stdout, reason = "Listing output")]
    {
        print!("{out}");
    }
    Ok(())
}

/// Print the effective configuration as TOML.
///
/// # Errors
/// Returns an error if the configuration cannot be loaded or is invalid
pub fn handle_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    config.validate().context("Invalid configuration")?;
    let rendered = config.to_toml()?;
    #[allow(clippy::print_stdout, reason = "Configuration output")]
    {
        print!("{rendered}");
    }
    Ok(())
}
