//! In-process stand-in for the translator page.
//!
//! Behaves like a debounced web translator: after an edit the output keeps
//! showing the previous result, then a provisional rendering (the romanized
//! text echoed back), and only once the debounce window has passed the final
//! translation. Time is read from `tokio::time`, so tests running with a
//! paused clock are deterministic.

use super::{ControlAdapter, SessionFactory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use transcheck_core::{Error, FixtureSet, Result, Suite};

/// Timing and fault behavior of a simulated translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedBehavior {
    /// Time from an edit until the provisional output appears
    pub render_latency: Duration,
    /// Time from an edit until the final output appears
    pub debounce: Duration,
    /// Whether the input region exists on the page
    pub input_present: bool,
    /// Whether the output region ever renders anything
    pub renders: bool,
}

impl Default for SimulatedBehavior {
    fn default() -> Self {
        Self {
            render_latency: Duration::from_millis(200),
            debounce: Duration::from_millis(800),
            input_present: true,
            renders: true,
        }
    }
}

/// Mutable page state.
#[derive(Debug, Default)]
struct PageState {
    input: String,
    last_edit: Option<Instant>,
    committed: String,
    last_seen: String,
    revision: u64,
    edits: usize,
}

/// A single simulated page.
#[derive(Debug)]
pub struct SimulatedTranslator {
    table: Arc<HashMap<String, String>>,
    behavior: SimulatedBehavior,
    state: Mutex<PageState>,
}

impl SimulatedTranslator {
    /// Create a page translating by exact lookup in `table`; unknown text passes through unchanged.
    #[must_use]
    pub fn new(table: Arc<HashMap<String, String>>, behavior: SimulatedBehavior) -> Self {
        Self {
            table,
            behavior,
            state: Mutex::new(PageState::default()),
        }
    }

    /// Current input content.
    ///
    /// # Errors
    /// Returns error if the state lock is poisoned
    pub fn input(&self) -> Result<String> {
        Ok(self.lock()?.input.clone())
    }

    /// Number of input mutations so far (one per clear, set, or typed character).
    ///
    /// # Errors
    /// Returns error if the state lock is poisoned
    pub fn edit_count(&self) -> Result<usize> {
        Ok(self.lock()?.edits)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PageState>> {
        self.state
            .lock()
            .map_err(|err| Error::Session(format!("Lock poisoned: {err}")))
    }

    fn ensure_input(&self) -> Result<()> {
        if self.behavior.input_present {
            Ok(())
        } else {
            Err(Error::ControlNotFound(
                "no textbox matches the configured accessible name".to_owned(),
            ))
        }
    }

    fn translate(&self, input: &str) -> String {
        self.table
            .get(input)
            .cloned()
            .unwrap_or_else(|| input.to_owned())
    }

    fn edit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut String),
    {
        let mut state = self.lock()?;
        mutate(&mut state.input);
        state.last_edit = Some(Instant::now());
        state.edits += 1;
        Ok(())
    }

    /// What the output region shows right now.
    fn render(&self, state: &mut PageState) -> String {
        if !self.behavior.renders {
            return String::new();
        }
        let Some(edited_at) = state.last_edit else {
            return state.committed.clone();
        };

        let since_edit = Instant::now().saturating_duration_since(edited_at);
        if since_edit >= self.behavior.debounce {
            state.committed = self.translate(&state.input);
            state.committed.clone()
        } else if since_edit >= self.behavior.render_latency {
            state.input.trim().to_owned()
        } else {
            state.committed.clone()
        }
    }

    /// Render the output and bump the revision if it differs from the last render seen.
    fn observe(&self, state: &mut PageState) -> String {
        let output = self.render(state).trim().to_owned();
        if output != state.last_seen {
            state.last_seen.clone_from(&output);
            state.revision += 1;
        }
        output
    }
}

#[async_trait]
impl ControlAdapter for SimulatedTranslator {
    async fn clear(&self) -> Result<()> {
        self.ensure_input()?;
        self.edit(String::clear)
    }

    async fn set_text(&self, text: &str) -> Result<()> {
        self.ensure_input()?;
        self.edit(|input| {
            input.clear();
            input.push_str(text);
        })
    }

    async fn type_incremental(&self, text: &str, per_char_delay: Duration) -> Result<()> {
        self.ensure_input()?;
        for (index, character) in text.chars().enumerate() {
            if index > 0 {
                sleep(per_char_delay).await;
            }
            self.edit(|input| input.push(character))?;
        }
        Ok(())
    }

    async fn read_output(&self) -> Result<String> {
        let mut state = self.lock()?;
        Ok(self.observe(&mut state))
    }

    async fn output_revision(&self) -> Result<Option<u64>> {
        let mut state = self.lock()?;
        self.observe(&mut state);
        Ok(Some(state.revision))
    }
}

/// Opens a fresh [`SimulatedTranslator`] per session.
#[derive(Debug)]
pub struct SimulatedSessions {
    table: Arc<HashMap<String, String>>,
    behavior: SimulatedBehavior,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl SimulatedSessions {
    /// Sessions translating with `table`.
    #[must_use]
    pub fn new(table: HashMap<String, String>, behavior: SimulatedBehavior) -> Self {
        Self {
            table: Arc::new(table),
            behavior,
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Sessions that translate every fixture input to its expected output.
    #[must_use]
    pub fn from_fixtures(fixtures: &FixtureSet, behavior: SimulatedBehavior) -> Self {
        let mut table = HashMap::new();
        for entry in fixtures.select(&Suite::ALL, None) {
            if let Some(case) = fixtures.case(entry.id()) {
                table.insert(case.input.clone(), case.expected.clone());
            } else if let Some(case) = fixtures.incremental_case(entry.id()) {
                table.insert(case.input.clone(), case.expected_final.clone());
            }
        }
        Self::new(table, behavior)
    }

    /// Number of sessions opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for SimulatedSessions {
    type Adapter = SimulatedTranslator;

    async fn open_session(&self) -> Result<SimulatedTranslator> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedTranslator::new(
            Arc::clone(&self.table),
            self.behavior,
        ))
    }

    async fn close_session(&self, _adapter: SimulatedTranslator) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> SimulatedTranslator {
        let table = HashMap::from([("api".to_owned(), "අපි".to_owned())]);
        SimulatedTranslator::new(Arc::new(table), SimulatedBehavior::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_passes_through_provisional_then_final() {
        let page = page();
        page.set_text("api").await.unwrap();
        assert_eq!(page.read_output().await.unwrap(), "");

        sleep(Duration::from_millis(250)).await;
        assert_eq!(page.read_output().await.unwrap(), "api");

        sleep(Duration::from_millis(600)).await;
        assert_eq!(page.read_output().await.unwrap(), "අපි");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_text_passes_through() {
        let page = page();
        page.set_text("21/05/2026").await.unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(page.read_output().await.unwrap(), "21/05/2026");
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_appends_in_order() {
        let page = page();
        page.set_text("ad").await.unwrap();
        page.type_incremental("ha wa", Duration::from_millis(150))
            .await
            .unwrap();
        assert_eq!(page.input().unwrap(), "adha wa");
        assert_eq!(page.edit_count().unwrap(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revision_tracks_output_changes() {
        let page = page();
        let initial = page.output_revision().await.unwrap();
        page.set_text("api").await.unwrap();
        sleep(Duration::from_secs(1)).await;
        let changed = page.output_revision().await.unwrap();
        let unchanged = page.output_revision().await.unwrap();
        assert!(changed > initial);
        assert_eq!(changed, unchanged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_and_revision_queries_count_each_render_once() {
        let page = page();
        let initial = page.output_revision().await.unwrap().unwrap();
        page.set_text("api").await.unwrap();

        sleep(Duration::from_millis(250)).await;
        assert_eq!(page.read_output().await.unwrap(), "api");
        assert_eq!(page.output_revision().await.unwrap(), Some(initial + 1));

        sleep(Duration::from_millis(600)).await;
        assert_eq!(page.output_revision().await.unwrap(), Some(initial + 2));
        assert_eq!(page.read_output().await.unwrap(), "අපි");
        assert_eq!(page.output_revision().await.unwrap(), Some(initial + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_input_reports_control_not_found() {
        let behavior = SimulatedBehavior {
            input_present: false,
            ..SimulatedBehavior::default()
        };
        let page = SimulatedTranslator::new(Arc::new(HashMap::new()), behavior);
        let error = page.clear().await.unwrap_err();
        assert!(matches!(error, Error::ControlNotFound(_)));
        page.type_incremental("a", Duration::ZERO).await.unwrap_err();
    }

    #[tokio::test]
    async fn test_sessions_are_fresh() {
        let sessions = SimulatedSessions::new(HashMap::new(), SimulatedBehavior::default());
        let first = sessions.open_session().await.unwrap();
        first.set_text("leftover").await.unwrap();
        sessions.close_session(first).await.unwrap();

        let second = sessions.open_session().await.unwrap();
        assert_eq!(second.input().unwrap(), "");
        assert_eq!(sessions.opened(), 2);
        assert_eq!(sessions.closed(), 1);
    }
}
