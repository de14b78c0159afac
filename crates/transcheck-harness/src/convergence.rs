//! Deciding when a debounced output has settled.
//!
//! Detection is two-phase: first wait for the output to become non-empty,
//! then wait out a settle margin, because the first render of a debounced
//! translator is often provisional. Every wait is bounded: a call returns
//! within `overall_timeout + settle_delay + poll_interval`.

use crate::control::ControlAdapter;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep, sleep_until, timeout};
use transcheck_core::config::TimingConfig;
use transcheck_core::{Error, Result, SettleStrategy};

/// Outcome of a successful convergence wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    /// Output seen when the region first became non-empty
    pub first_output: String,
    /// Time until the region became non-empty
    pub detected_after: Duration,
    /// Time spent in the settle phase
    pub settled_for: Duration,
}

/// What the quiescent settle phase compares between polls.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputMarker {
    Revision(u64),
    Text(String),
}

/// Polls an adapter's output region until it converges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceDetector {
    poll_interval: Duration,
    overall_timeout: Duration,
    settle_delay: Duration,
    strategy: SettleStrategy,
    quiet_window: Duration,
}

impl ConvergenceDetector {
    /// Detector with the fixed settle strategy.
    #[must_use]
    pub fn new(poll_interval: Duration, overall_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            overall_timeout,
            settle_delay,
            strategy: SettleStrategy::Fixed,
            quiet_window: settle_delay,
        }
    }

    /// Detector configured from the timing section.
    #[must_use]
    pub fn from_config(timing: &TimingConfig) -> Self {
        let detector = Self::new(
            timing.poll_interval(),
            timing.convergence_timeout(),
            timing.settle_delay(),
        );
        match timing.settle_strategy {
            SettleStrategy::Fixed => detector,
            SettleStrategy::Quiescent => detector.with_quiescence(timing.quiet_window()),
        }
    }

    /// Return from the settle phase early once the output is unchanged for `quiet_window`.
    #[must_use]
    pub fn with_quiescence(mut self, quiet_window: Duration) -> Self {
        self.strategy = SettleStrategy::Quiescent;
        self.quiet_window = quiet_window.min(self.settle_delay);
        self
    }

    /// Upper bound on how long [`Self::await_convergence`] can take.
    pub fn max_wait(&self) -> Duration {
        self.overall_timeout + self.settle_delay + self.poll_interval
    }

    /// Wait for non-empty output, then for the settle phase.
    ///
    /// # Errors
    /// `ConvergenceTimeout` if the output stays empty for the whole budget;
    /// adapter errors are propagated
    pub async fn await_convergence<A>(&self, adapter: &A) -> Result<Convergence>
    where
        A: ControlAdapter + ?Sized,
    {
        let started = Instant::now();
        let first_output = match timeout(self.overall_timeout, self.poll_until_non_empty(adapter))
            .await
        {
            Ok(output) => output?,
            Err(_elapsed) => {
                return Err(Error::ConvergenceTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        };
        let detected_after = started.elapsed();
        tracing::debug!(
            "Output appeared after {}ms: {first_output:?}",
            detected_after.as_millis()
        );

        let settle_started = Instant::now();
        match self.strategy {
            SettleStrategy::Fixed => sleep(self.settle_delay).await,
            SettleStrategy::Quiescent => {
                if timeout(self.settle_delay, self.settle_quietly(adapter))
                    .await
                    .is_ok_and(|settled| settled.is_err())
                {
                    tracing::debug!("Output read failed while settling; settle phase cut short");
                }
            }
        }

        Ok(Convergence {
            first_output,
            detected_after,
            settled_for: settle_started.elapsed(),
        })
    }

    /// Wait up to `budget` for the output to read empty after a clear.
    ///
    /// With the fixed strategy the full budget is always spent, absorbing
    /// re-renders triggered by the clear.
    ///
    /// # Errors
    /// Adapter errors are propagated
    pub async fn await_cleared<A>(&self, adapter: &A, budget: Duration) -> Result<()>
    where
        A: ControlAdapter + ?Sized,
    {
        let deadline = Instant::now() + budget;
        match timeout(budget, self.poll_until_empty(adapter)).await {
            Ok(polled) => polled?,
            Err(_elapsed) => {
                tracing::debug!(
                    "Output still non-empty {}ms after clear",
                    budget.as_millis()
                );
            }
        }
        if self.strategy == SettleStrategy::Fixed {
            sleep_until(deadline).await;
        }
        Ok(())
    }

    /// Wait `delay`, then return the output if it is non-empty at that instant.
    ///
    /// # Errors
    /// Adapter errors are propagated
    pub async fn observe_non_empty<A>(&self, adapter: &A, delay: Duration) -> Result<Option<String>>
    where
        A: ControlAdapter + ?Sized,
    {
        sleep(delay).await;
        let output = adapter.read_output().await?;
        Ok((!output.is_empty()).then_some(output))
    }

    async fn poll_until_non_empty<A>(&self, adapter: &A) -> Result<String>
    where
        A: ControlAdapter + ?Sized,
    {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let output = adapter.read_output().await?;
            if !output.is_empty() {
                return Ok(output);
            }
        }
    }

    async fn poll_until_empty<A>(&self, adapter: &A) -> Result<()>
    where
        A: ControlAdapter + ?Sized,
    {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if adapter.read_output().await?.is_empty() {
                return Ok(());
            }
        }
    }

    /// Poll until the output has re-rendered at least once since detection
    /// and then stayed unchanged for the quiet window.
    ///
    /// The render seen at detection may be provisional, so quiet time only
    /// counts from a later change. Without one the caller's settle budget
    /// runs out instead.
    async fn settle_quietly<A>(&self, adapter: &A) -> Result<()>
    where
        A: ControlAdapter + ?Sized,
    {
        let mut marker = Self::marker(adapter).await?;
        let mut last_change: Option<Instant> = None;
        loop {
            if last_change.is_some_and(|changed_at| changed_at.elapsed() >= self.quiet_window) {
                tracing::debug!(
                    "Output quiet for {}ms after re-rendering, settled early",
                    self.quiet_window.as_millis()
                );
                return Ok(());
            }
            sleep(self.poll_interval).await;
            let current = Self::marker(adapter).await?;
            if current != marker {
                marker = current;
                last_change = Some(Instant::now());
            }
        }
    }

    async fn marker<A>(adapter: &A) -> Result<OutputMarker>
    where
        A: ControlAdapter + ?Sized,
    {
        Ok(match adapter.output_revision().await? {
            Some(revision) => OutputMarker::Revision(revision),
            None => OutputMarker::Text(adapter.read_output().await?),
        })
    }
}

impl From<&TimingConfig> for ConvergenceDetector {
    fn from(timing: &TimingConfig) -> Self {
        Self::from_config(timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{SimulatedBehavior, SimulatedTranslator};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn translator(behavior: SimulatedBehavior) -> SimulatedTranslator {
        let table = HashMap::from([(
            "mama adha ennee naehae.".to_owned(),
            "මම අද එන්නේ නැහැ.".to_owned(),
        )]);
        SimulatedTranslator::new(Arc::new(table), behavior)
    }

    fn detector() -> ConvergenceDetector {
        ConvergenceDetector::new(
            Duration::from_millis(100),
            Duration::from_secs(5),
            Duration::from_secs(3),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_detects_then_settles_to_final_output() {
        let page = translator(SimulatedBehavior::default());
        page.set_text("mama adha ennee naehae.").await.unwrap();

        let convergence = detector().await_convergence(&page).await.unwrap();
        assert_eq!(convergence.first_output, "mama adha ennee naehae.");
        assert!(convergence.detected_after >= Duration::from_millis(200));
        assert!(convergence.settled_for >= Duration::from_secs(3));
        assert!(convergence.settled_for < Duration::from_millis(3_100));
        assert_eq!(page.read_output().await.unwrap(), "මම අද එන්නේ නැහැ.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_bounded() {
        let page = translator(SimulatedBehavior {
            renders: false,
            ..SimulatedBehavior::default()
        });
        page.set_text("mama").await.unwrap();

        let detector = detector();
        let started = Instant::now();
        let error = detector.await_convergence(&page).await.unwrap_err();
        let waited = started.elapsed();

        assert!(matches!(error, Error::ConvergenceTimeout { .. }));
        assert!(waited >= Duration::from_secs(5));
        assert!(waited <= detector.max_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiescent_settle_returns_early() {
        let page = translator(SimulatedBehavior::default());
        page.set_text("mama adha ennee naehae.").await.unwrap();

        let detector = detector().with_quiescence(Duration::from_millis(500));
        let convergence = detector.await_convergence(&page).await.unwrap();

        // Provisional at 200ms, final at 800ms, then 500ms of quiet.
        assert_eq!(convergence.first_output, "mama adha ennee naehae.");
        assert!(convergence.settled_for >= Duration::from_millis(1_100));
        assert!(convergence.settled_for < Duration::from_secs(3));
        assert_eq!(page.read_output().await.unwrap(), "මම අද එන්නේ නැහැ.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_window_shorter_than_debounce_waits_for_rerender() {
        let page = translator(SimulatedBehavior {
            debounce: Duration::from_millis(1_600),
            ..SimulatedBehavior::default()
        });
        page.set_text("mama adha ennee naehae.").await.unwrap();

        // The provisional echo stays put for 1.4s, far longer than the window.
        let detector = detector().with_quiescence(Duration::from_millis(300));
        let convergence = detector.await_convergence(&page).await.unwrap();

        assert!(convergence.settled_for >= Duration::from_millis(1_700));
        assert_eq!(page.read_output().await.unwrap(), "මම අද එන්නේ නැහැ.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiescent_settle_without_rerender_spends_settle_delay() {
        let page = translator(SimulatedBehavior::default());
        // Unknown text is committed unchanged, so nothing re-renders.
        page.set_text("kohomadha").await.unwrap();

        let detector = detector().with_quiescence(Duration::from_millis(500));
        let convergence = detector.await_convergence(&page).await.unwrap();

        assert!(convergence.settled_for >= Duration::from_secs(3));
        assert!(convergence.settled_for <= Duration::from_millis(3_100));
        assert_eq!(page.read_output().await.unwrap(), "kohomadha");
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiescent_settle_never_exceeds_settle_delay() {
        let page = translator(SimulatedBehavior {
            render_latency: Duration::ZERO,
            debounce: Duration::from_secs(60),
            ..SimulatedBehavior::default()
        });
        page.type_incremental("mama", Duration::ZERO).await.unwrap();

        // Output echoes every keystroke, so it never stays quiet while typing.
        let detector = ConvergenceDetector::new(
            Duration::from_millis(50),
            Duration::from_secs(5),
            Duration::from_secs(1),
        )
        .with_quiescence(Duration::from_millis(500));
        let typing = page.type_incremental(" adha ennee naehae", Duration::from_millis(100));
        let (converged, typed) = tokio::join!(detector.await_convergence(&page), typing);
        typed.unwrap();

        let convergence = converged.unwrap();
        assert!(convergence.settled_for >= Duration::from_millis(900));
        assert!(convergence.settled_for <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_is_idempotent() {
        let page = translator(SimulatedBehavior::default());
        page.set_text("mama adha ennee naehae.").await.unwrap();
        sleep(Duration::from_secs(1)).await;
        assert!(!page.read_output().await.unwrap().is_empty());

        page.clear().await.unwrap();
        page.clear().await.unwrap();
        detector()
            .await_cleared(&page, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(page.read_output().await.unwrap(), "");
        let later = detector()
            .observe_non_empty(&page, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(later, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_clear_wait_spends_full_budget() {
        let page = translator(SimulatedBehavior::default());
        page.clear().await.unwrap();
        let started = Instant::now();
        detector()
            .await_cleared(&page, Duration::from_secs(1))
            .await
            .unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_millis(1_100));
    }
}
