//! Scenario runner.
//!
//! Enumerates the selected fixtures and runs each one on its own session,
//! so no case can observe state left behind by another. Failures are
//! recorded per case; nothing short of a panic stops the run.

use crate::control::SessionFactory;
use crate::driver::{VerificationDriver, failed_to_start};
use crate::report::RunReport;
use futures::stream::{self, StreamExt as _};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use transcheck_core::{FixtureRef, FixtureSet, HarnessConfig, ObservedResult, Suite};

/// Runs fixtures against sessions opened by a [`SessionFactory`].
#[derive(Debug)]
pub struct ScenarioRunner<F> {
    factory: F,
    driver: VerificationDriver,
    inter_case_delay: Duration,
    parallelism: usize,
}

impl<F: SessionFactory> ScenarioRunner<F> {
    /// Create a runner with the timing and parallelism from `config`.
    #[must_use]
    pub fn new(factory: F, config: &HarnessConfig) -> Self {
        Self {
            factory,
            driver: VerificationDriver::new(&config.timing),
            inter_case_delay: config.timing.inter_case_delay(),
            parallelism: config.run.parallelism.max(1),
        }
    }

    /// The session factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Take back the session factory (e.g. to shut the browser down).
    pub fn into_factory(self) -> F {
        self.factory
    }

    /// Run the selected suites, optionally restricted to ids containing `filter`.
    pub async fn run(&self, fixtures: &FixtureSet, suites: &[Suite], filter: Option<&str>) -> RunReport {
        let entries = fixtures.select(suites, filter);
        tracing::info!(
            "Running {} case(s) with parallelism {}",
            entries.len(),
            self.parallelism
        );
        self.run_entries(&entries).await
    }

    /// Run the given cases; results come back in the order given.
    pub async fn run_entries(&self, entries: &[FixtureRef<'_>]) -> RunReport {
        let mut report = RunReport::new();

        if self.parallelism <= 1 {
            for (index, entry) in entries.iter().enumerate() {
                if index > 0 {
                    sleep(self.inter_case_delay).await;
                }
                report.record(self.run_isolated(*entry).await);
            }
        } else {
            let mut results: Vec<(usize, ObservedResult)> = stream::iter(entries.iter().enumerate())
                .map(|(index, entry)| async move {
                    let result = self.run_isolated(*entry).await;
                    sleep(self.inter_case_delay).await;
                    (index, result)
                })
                .buffer_unordered(self.parallelism)
                .collect()
                .await;
            results.sort_by_key(|(index, _)| *index);
            for (_, result) in results {
                report.record(result);
            }
        }

        report.finish();
        report
    }

    /// Open a session, run one case on it, release it.
    async fn run_isolated(&self, entry: FixtureRef<'_>) -> ObservedResult {
        let started = Instant::now();
        let adapter = match self.factory.open_session().await {
            Ok(adapter) => adapter,
            Err(error) => return failed_to_start(entry, error, started.elapsed()),
        };

        let mut result = self.driver.run_entry(&adapter, entry).await;

        if let Err(err) = self.factory.close_session(adapter).await {
            tracing::warn!("Failed to close session for {}: {err}", entry.id());
            let note = format!("session close failed: {err}");
            result.detail = Some(match result.detail.take() {
                Some(detail) => format!("{detail}\n{note}"),
                None => note,
            });
        }
        result
    }
}
