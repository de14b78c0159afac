//! Core types for the transcheck verification harness.
//!
//! This crate provides the fixture data model, the error type, the harness
//! configuration and fixture loading shared by the harness and the CLI.

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

/// Harness configuration and its layering.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Fixture discovery, loading and validation.
pub mod fixture_loader;
/// Fixture and result data types.
pub mod types;

pub use config::{HarnessConfig, NameMatch, SettleStrategy};
pub use error::{Error, ErrorKind, Result};
pub use fixture_loader::{FixtureFile, FixtureRef, FixtureSet};
pub use types::{IncrementalState, IncrementalTestCase, LengthClass, ObservedResult, Suite, TestCase};
