//! Run report types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use transcheck_core::{ErrorKind, ObservedResult};

/// Pass/fail counts for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    /// Cases that passed
    pub passed: usize,
    /// Cases that failed
    pub failed: usize,
}

/// Outcome of a whole run, one entry per case in fixture order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Whether every case passed
    pub passed: bool,
    /// Per-case results
    pub results: Vec<ObservedResult>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    /// Create an empty report starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            passed: true,
            results: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Add one case result.
    pub fn record(&mut self, result: ObservedResult) {
        if !result.passed {
            self.passed = false;
        }
        self.results.push(result);
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of passing cases.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|result| result.passed).count()
    }

    /// Number of failing cases.
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }

    /// Result for a case id.
    pub fn result(&self, case_id: &str) -> Option<&ObservedResult> {
        self.results.iter().find(|result| result.case_id == case_id)
    }

    /// Counts per category, sorted by category name.
    pub fn summary_by_category(&self) -> BTreeMap<&str, CategoryTally> {
        let mut summary: BTreeMap<&str, CategoryTally> = BTreeMap::new();
        for result in &self.results {
            let tally = summary.entry(result.category.as_str()).or_default();
            if result.passed {
                tally.passed += 1;
            } else {
                tally.failed += 1;
            }
        }
        summary
    }

    /// Human-readable report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            let _ignored = writeln!(
                out,
                "{status} {} [{}] {} ({}ms)",
                result.case_id, result.suite, result.label, result.elapsed_ms
            );
            if result.passed {
                continue;
            }
            let _ignored = writeln!(out, "    expected: {}", result.expected);
            let _ignored = writeln!(out, "    actual:   {}", result.actual_output);
            if let Some(kind) = result.error_kind {
                let _ignored = writeln!(out, "    kind:     {}", ErrorKind::label(kind));
            }
            if let Some(detail) = &result.detail {
                for line in detail.lines() {
                    let _ignored = writeln!(out, "    {line}");
                }
            }
            if let Some(note) = &result.review_note {
                let _ignored = writeln!(out, "    note:     {note}");
            }
        }

        let _ignored = writeln!(
            out,
            "\n{} passed, {} failed, {} total",
            self.passed_count(),
            self.failed_count(),
            self.results.len()
        );
        for (category, tally) in self.summary_by_category() {
            let _ignored = writeln!(
                out,
                "  {category}: {} passed, {} failed",
                tally.passed, tally.failed
            );
        }
        out
    }

    /// Machine-readable report.
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcheck_core::Suite;

    fn result(case_id: &str, category: &str, passed: bool) -> ObservedResult {
        ObservedResult {
            case_id: case_id.to_owned(),
            label: "label".to_owned(),
            category: category.to_owned(),
            suite: Suite::Negative,
            expected: "මම".to_owned(),
            actual_output: if passed { "මම" } else { "mama" }.to_owned(),
            passed,
            elapsed_ms: 10,
            error_kind: (!passed).then_some(ErrorKind::AssertionMismatch),
            detail: (!passed).then(|| "first difference at char 0".to_owned()),
            reached_state: None,
            review_note: None,
        }
    }

    #[test]
    fn test_record_tracks_overall_status() {
        let mut report = RunReport::new();
        report.record(result("Neg_Fun_0001", "Typo", true));
        assert!(report.passed);
        report.record(result("Neg_Fun_0002", "Typo", false));
        assert!(!report.passed);
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn test_summary_groups_by_category() {
        let mut report = RunReport::new();
        report.record(result("a", "Typo", true));
        report.record(result("b", "Typo", false));
        report.record(result("c", "Spacing", true));

        let summary = report.summary_by_category();
        assert_eq!(summary["Typo"], CategoryTally { passed: 1, failed: 1 });
        assert_eq!(summary["Spacing"], CategoryTally { passed: 1, failed: 0 });
    }

    #[test]
    fn test_render_text_shows_failure_detail() {
        let mut report = RunReport::new();
        report.record(result("Neg_Fun_0001", "Typo", true));
        let mut failing = result("Neg_Fun_0006", "Typo", false);
        failing.review_note = Some("expected output needs review".to_owned());
        report.record(failing);

        let text = report.render_text();
        assert!(text.contains("PASS Neg_Fun_0001"));
        assert!(text.contains("FAIL Neg_Fun_0006"));
        assert!(text.contains("actual:   mama"));
        assert!(text.contains("AssertionMismatchError"));
        assert!(text.contains("note:     expected output needs review"));
        assert!(text.contains("1 passed, 1 failed, 2 total"));
    }

    #[test]
    fn test_json_uses_snake_case_kinds() {
        let mut report = RunReport::new();
        report.record(result("Neg_Fun_0002", "Typo", false));
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passed"], false);
        assert_eq!(value["results"][0]["error_kind"], "assertion_mismatch");
    }
}
