//! Per-phase timing collection.
//!
//! The driver opens `case`, `clear`, `input` and `convergence` spans; this
//! layer records how long each one stayed open so a run can report where its
//! time went.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Write as _};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Id as SpanId, Subscriber, span};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Timing data for a single span
#[derive(Debug, Clone)]
pub struct SpanTiming {
    /// Span name
    pub name: String,
    /// Start time
    pub start: Instant,
    /// Duration (set when span closes)
    pub duration: Option<Duration>,
    /// Parent span ID
    pub parent_id: Option<SpanId>,
    /// Case id recorded on `case` spans
    pub case_id: Option<String>,
}

/// Aggregate over all closed spans sharing a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    /// Number of closed spans
    pub count: usize,
    /// Sum of their durations
    pub total_ms: u64,
    /// Longest single span
    pub max_ms: u64,
}

#[derive(Serialize)]
struct SpanRecord<'data> {
    id: u64,
    name: &'data str,
    #[serde(skip_serializing_if = "Option::is_none")]
    case_id: Option<&'data str>,
    duration_ms: Option<u64>,
    parent: Option<u64>,
}

#[derive(Serialize)]
struct TimingExport<'data> {
    spans: Vec<SpanRecord<'data>>,
}

/// Collected timing data from all spans
#[derive(Debug, Clone, Default)]
pub struct TimingData {
    /// All span timings by ID
    pub spans: HashMap<SpanId, SpanTiming>,
    /// Root span IDs (no parent)
    pub roots: Vec<SpanId>,
}

impl TimingData {
    /// Per-name totals over closed spans.
    pub fn phase_summary(&self) -> BTreeMap<String, PhaseSummary> {
        let mut summary: BTreeMap<String, PhaseSummary> = BTreeMap::new();
        for timing in self.spans.values() {
            let Some(duration) = timing.duration else {
                continue;
            };
            let millis = duration.as_millis() as u64;
            let phase = summary.entry(timing.name.clone()).or_default();
            phase.count += 1;
            phase.total_ms += millis;
            phase.max_ms = phase.max_ms.max(millis);
        }
        summary
    }

    /// Slowest closed `case` spans, longest first.
    pub fn slowest_cases(&self, limit: usize) -> Vec<(&str, Duration)> {
        let mut cases: Vec<(&str, Duration)> = self
            .spans
            .values()
            .filter(|timing| timing.name == "case")
            .filter_map(|timing| Some((timing.case_id.as_deref()?, timing.duration?)))
            .collect();
        cases.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(right.0)));
        cases.truncate(limit);
        cases
    }

    /// Phase table for the end of a run.
    pub fn render_summary(&self) -> String {
        let mut out = String::from("phase         count   total(ms)   max(ms)\n");
        for (name, phase) in self.phase_summary() {
            let _ignored = writeln!(
                out,
                "{name:<12} {:>6} {:>11} {:>9}",
                phase.count, phase.total_ms, phase.max_ms
            );
        }
        for (case_id, duration) in self.slowest_cases(3) {
            let _ignored = writeln!(out, "slow: {case_id} {}ms", duration.as_millis());
        }
        out
    }

    /// Export to JSON for external analysis
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut records: Vec<SpanRecord<'_>> = self
            .spans
            .iter()
            .map(|(id, timing)| SpanRecord {
                id: id.into_u64(),
                name: &timing.name,
                case_id: timing.case_id.as_deref(),
                duration_ms: timing.duration.map(|dur| dur.as_millis() as u64),
                parent: timing.parent_id.as_ref().map(SpanId::into_u64),
            })
            .collect();
        records.sort_by_key(|record| record.id);
        serde_json::to_string_pretty(&TimingExport { spans: records })
    }
}

/// Pulls the `id` field off a span's attributes.
#[derive(Default)]
struct CaseIdVisitor {
    case_id: Option<String>,
}

impl Visit for CaseIdVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "id" {
            self.case_id = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "id" {
            self.case_id = Some(format!("{value:?}"));
        }
    }
}

/// Tracing layer that collects timing data
pub struct TimingLayer {
    /// Shared timing data
    data: Arc<Mutex<TimingData>>,
}

impl TimingLayer {
    /// Create new timing layer
    #[must_use]
    pub fn new() -> (Self, Arc<Mutex<TimingData>>) {
        let data = Arc::new(Mutex::new(TimingData::default()));
        (
            Self {
                data: Arc::clone(&data),
            },
            data,
        )
    }
}

impl<S> Layer<S> for TimingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut visitor = CaseIdVisitor::default();
        attrs.record(&mut visitor);

        // Contextual parents come from the registry, explicit ones from the attributes.
        let parent_id = attrs
            .parent()
            .cloned()
            .or_else(|| ctx.current_span().id().cloned())
            .filter(|_| !attrs.is_root());

        let Ok(mut data) = self.data.lock() else {
            return;
        };
        if parent_id.is_none() {
            data.roots.push(id.clone());
        }
        data.spans.insert(
            id.clone(),
            SpanTiming {
                name: attrs.metadata().name().to_owned(),
                start: Instant::now(),
                duration: None,
                parent_id,
                case_id: visitor.case_id,
            },
        );
    }

    fn on_close(&self, id: span::Id, _ctx: Context<'_, S>) {
        let Ok(mut data) = self.data.lock() else {
            return;
        };

        if let Some(timing) = data.spans.get_mut(&id) {
            timing.duration = Some(timing.start.elapsed());
        }
    }
}
