//! Per-case verification: clear, input, converge, read, compare.

use crate::control::ControlAdapter;
use crate::convergence::ConvergenceDetector;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument as _;
use transcheck_core::config::TimingConfig;
use transcheck_core::{
    Error, ErrorKind, FixtureRef, IncrementalState, IncrementalTestCase, ObservedResult, Result,
    Suite, TestCase,
};

/// Placeholder expectation reported when the intermediate output is empty.
const NON_EMPTY_EXPECTATION: &str = "<any non-empty provisional output>";

/// Characters of context shown around the first difference.
const DIFF_CONTEXT: usize = 12;

/// Drives one adapter through a case and turns the outcome into an [`ObservedResult`].
///
/// Errors raised while driving a case never escape: they are recorded in the
/// returned result.
#[derive(Debug, Clone)]
pub struct VerificationDriver {
    detector: ConvergenceDetector,
    after_clear_delay: Duration,
    keystroke_delay: Duration,
    partial_observation_delay: Duration,
}

impl VerificationDriver {
    /// Driver using the waits from `timing`.
    #[must_use]
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            detector: ConvergenceDetector::from_config(timing),
            after_clear_delay: timing.after_clear_delay(),
            keystroke_delay: timing.keystroke_delay(),
            partial_observation_delay: timing.partial_observation_delay(),
        }
    }

    /// Run any fixture with the procedure its kind requires.
    pub async fn run_entry<A>(&self, adapter: &A, entry: FixtureRef<'_>) -> ObservedResult
    where
        A: ControlAdapter + ?Sized,
    {
        match entry {
            FixtureRef::Bulk { suite, case } => self.run_case(adapter, suite, case).await,
            FixtureRef::Incremental(case) => self.run_incremental(adapter, case).await,
        }
    }

    /// Bulk case: clear, settle, set the whole input, await convergence, compare.
    pub async fn run_case<A>(&self, adapter: &A, suite: Suite, case: &TestCase) -> ObservedResult
    where
        A: ControlAdapter + ?Sized,
    {
        let started = Instant::now();
        let outcome = self
            .execute_bulk(adapter, case)
            .instrument(tracing::info_span!("case", id = %case.id))
            .await;

        let entry = FixtureRef::Bulk { suite, case };
        let result = conclude(entry, &case.expected, outcome, started.elapsed(), None);
        log_result(&result);
        result
    }

    /// Incremental case: type the prefix, observe provisional output, type the rest, compare.
    pub async fn run_incremental<A>(&self, adapter: &A, case: &IncrementalTestCase) -> ObservedResult
    where
        A: ControlAdapter + ?Sized,
    {
        let started = Instant::now();
        let mut state = IncrementalState::Empty;
        let outcome = self
            .execute_incremental(adapter, case, &mut state)
            .instrument(tracing::info_span!("case", id = %case.id))
            .await;

        let mut result = conclude(
            FixtureRef::Incremental(case),
            &case.expected_final,
            outcome,
            started.elapsed(),
            Some(state),
        );
        if result.passed
            && let Some(next) = state.next()
        {
            result.reached_state = Some(next);
        }
        log_result(&result);
        result
    }

    async fn execute_bulk<A>(&self, adapter: &A, case: &TestCase) -> Result<String>
    where
        A: ControlAdapter + ?Sized,
    {
        self.clear_and_settle(adapter).await?;

        adapter
            .set_text(&case.input)
            .instrument(tracing::info_span!("input"))
            .await?;

        self.detector
            .await_convergence(adapter)
            .instrument(tracing::info_span!("convergence"))
            .await?;

        adapter.read_output().await
    }

    async fn execute_incremental<A>(
        &self,
        adapter: &A,
        case: &IncrementalTestCase,
        state: &mut IncrementalState,
    ) -> Result<String>
    where
        A: ControlAdapter + ?Sized,
    {
        if !case.has_valid_prefix() {
            return Err(Error::Fixture(format!(
                "partial_input of {} is not a strict prefix of its input",
                case.id
            )));
        }

        self.clear_and_settle(adapter).await?;

        adapter
            .type_incremental(&case.partial_input, self.keystroke_delay)
            .instrument(tracing::info_span!("input"))
            .await?;
        advance(state, IncrementalState::PartiallyTyped);

        let Some(intermediate) = self
            .detector
            .observe_non_empty(adapter, self.partial_observation_delay)
            .await?
        else {
            return Err(Error::AssertionMismatch {
                expected: NON_EMPTY_EXPECTATION.to_owned(),
                actual: String::new(),
            });
        };
        tracing::debug!("Intermediate output for {}: {intermediate:?}", case.id);
        advance(state, IncrementalState::IntermediateOutputObserved);

        adapter
            .type_incremental(case.remainder(), self.keystroke_delay)
            .instrument(tracing::info_span!("input"))
            .await?;
        advance(state, IncrementalState::FullyTyped);

        self.detector
            .await_convergence(adapter)
            .instrument(tracing::info_span!("convergence"))
            .await?;

        adapter.read_output().await
    }

    async fn clear_and_settle<A>(&self, adapter: &A) -> Result<()>
    where
        A: ControlAdapter + ?Sized,
    {
        async {
            adapter.clear().await?;
            self.detector
                .await_cleared(adapter, self.after_clear_delay)
                .await
        }
        .instrument(tracing::info_span!("clear"))
        .await
    }
}

fn advance(state: &mut IncrementalState, to: IncrementalState) {
    tracing::debug!("Incremental scenario: {state:?} -> {to:?}");
    *state = to;
}

/// Build the result record for a finished case.
fn conclude(
    entry: FixtureRef<'_>,
    expected: &str,
    outcome: Result<String>,
    elapsed: Duration,
    reached_state: Option<IncrementalState>,
) -> ObservedResult {
    let mut result = ObservedResult {
        case_id: entry.id().to_owned(),
        label: entry.label().to_owned(),
        category: entry.category().to_owned(),
        suite: entry.suite(),
        expected: expected.to_owned(),
        actual_output: String::new(),
        passed: false,
        elapsed_ms: elapsed.as_millis() as u64,
        error_kind: None,
        detail: None,
        reached_state,
        review_note: entry.review_note().map(str::to_owned),
    };

    match outcome {
        Ok(actual) if actual == expected => {
            result.passed = true;
            result.actual_output = actual;
        }
        Ok(actual) => {
            result.error_kind = Some(ErrorKind::AssertionMismatch);
            result.detail = Some(mismatch_detail(expected, &actual));
            result.actual_output = actual;
        }
        Err(Error::AssertionMismatch {
            expected: wanted,
            actual,
        }) => {
            result.error_kind = Some(ErrorKind::AssertionMismatch);
            result.detail = Some(format!("expected {wanted}, got {actual:?}"));
            result.actual_output = actual;
        }
        Err(error) => {
            result.error_kind = Some(error.kind().unwrap_or(ErrorKind::Session));
            result.detail = Some(error.to_string());
        }
    }
    result
}

/// Record a case that could not even start (session failed to open).
pub(crate) fn failed_to_start(entry: FixtureRef<'_>, error: Error, elapsed: Duration) -> ObservedResult {
    let expected = match entry {
        FixtureRef::Bulk { case, .. } => case.expected.as_str(),
        FixtureRef::Incremental(case) => case.expected_final.as_str(),
    };
    let reached = matches!(entry, FixtureRef::Incremental(_)).then_some(IncrementalState::Empty);
    let result = conclude(entry, expected, Err(error), elapsed, reached);
    log_result(&result);
    result
}

fn log_result(result: &ObservedResult) {
    if result.passed {
        tracing::info!(
            "PASS {} ({}ms)",
            result.case_id,
            result.elapsed_ms
        );
    } else {
        tracing::warn!(
            "FAIL {} [{}]: {}",
            result.case_id,
            result.error_kind.map_or("unknown", ErrorKind::label),
            result.detail.as_deref().unwrap_or_default()
        );
    }
}

/// Describe where two strings first diverge, by character index.
pub fn mismatch_detail(expected: &str, actual: &str) -> String {
    let expected_chars: Vec<char> = expected.chars().collect();
    let actual_chars: Vec<char> = actual.chars().collect();
    let index = expected_chars
        .iter()
        .zip(&actual_chars)
        .take_while(|(wanted, got)| wanted == got)
        .count();

    let excerpt = |chars: &[char]| -> String {
        let start = index.saturating_sub(DIFF_CONTEXT / 2);
        let end = (index + DIFF_CONTEXT).min(chars.len());
        chars
            .get(start..end)
            .map_or_else(String::new, |slice| slice.iter().collect())
    };

    [
        format!(
            "first difference at char {index} (expected {} chars, got {} chars)",
            expected_chars.len(),
            actual_chars.len()
        ),
        format!("  expected ...{:?}", excerpt(&expected_chars)),
        format!("  actual   ...{:?}", excerpt(&actual_chars)),
    ]
    .join("\n")
}
