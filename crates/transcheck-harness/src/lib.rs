//! Synchronization and verification harness for a live translator UI.
//!
//! The [`ScenarioRunner`] opens one isolated session per fixture, the
//! [`VerificationDriver`] walks each case through clear, input, convergence
//! and comparison, and the [`ConvergenceDetector`] decides when the
//! debounced output has settled.

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

/// Access to the translator's input and output regions.
pub mod control;
/// Convergence detection over a debounced output.
pub mod convergence;
/// Per-case verification.
pub mod driver;
/// Run report types.
pub mod report;
/// Session-per-case scenario runner.
pub mod runner;
/// Span timing collection.
pub mod timing;

pub use control::{
    ChromiumAdapter, ChromiumSessionFactory, ControlAdapter, SessionFactory, SimulatedBehavior,
    SimulatedSessions, SimulatedTranslator,
};
pub use convergence::{Convergence, ConvergenceDetector};
pub use driver::{VerificationDriver, mismatch_detail};
pub use report::{CategoryTally, RunReport};
pub use runner::ScenarioRunner;
pub use timing::{PhaseSummary, SpanTiming, TimingData, TimingLayer};
