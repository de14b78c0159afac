//! Fixture and result data types.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rough size bucket of a fixture's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthClass {
    /// Short phrase.
    S,
    /// Sentence or two.
    M,
    /// Paragraph.
    L,
}

/// Group a case belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suite {
    /// Input the translator is expected to handle correctly.
    Positive,
    /// Malformed, slang or mixed input documenting known limitations.
    Negative,
    /// Typed character by character with an intermediate observation.
    Incremental,
}

impl Suite {
    /// All suites in run order.
    pub const ALL: [Self; 3] = [Self::Positive, Self::Negative, Self::Incremental];

    /// Lowercase name used in reports and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bulk translation case: the whole input is set at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    /// Unique, stable identifier
    pub id: String,
    /// Human-readable intent
    pub label: String,
    /// Romanized text typed into the input region
    pub input: String,
    /// Exact expected output text
    pub expected: String,
    /// Usage category (report grouping)
    pub category: String,
    /// Grammatical shape of the input
    pub grammar_class: String,
    /// Input size bucket
    pub length_class: LengthClass,
    /// Reviewer note for fixtures whose data is suspect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
}

/// A case typed in two halves with an observation of the provisional output in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncrementalTestCase {
    /// Unique, stable identifier
    pub id: String,
    /// Human-readable intent
    pub label: String,
    /// Full romanized text
    pub input: String,
    /// Strict, non-empty prefix of `input` typed first
    pub partial_input: String,
    /// Exact expected output once the full input has been typed
    pub expected_final: String,
    /// Usage category (report grouping)
    pub category: String,
    /// Grammatical shape of the input
    pub grammar_class: String,
    /// Input size bucket
    pub length_class: LengthClass,
    /// Reviewer note for fixtures whose data is suspect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
}

impl IncrementalTestCase {
    /// Whether `partial_input` is a strict, non-empty prefix of `input`.
    pub fn has_valid_prefix(&self) -> bool {
        !self.partial_input.is_empty()
            && self.partial_input.len() < self.input.len()
            && self.input.starts_with(&self.partial_input)
    }

    /// Text typed after the intermediate observation.
    ///
    /// Empty when the prefix invariant does not hold.
    pub fn remainder(&self) -> &str {
        if self.has_valid_prefix() {
            &self.input[self.partial_input.len()..]
        } else {
            ""
        }
    }
}

/// States of the incremental typing scenario, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementalState {
    /// Input cleared, nothing typed.
    Empty,
    /// The partial input has been typed.
    PartiallyTyped,
    /// Non-empty provisional output was seen.
    IntermediateOutputObserved,
    /// The remainder has been typed.
    FullyTyped,
    /// Output converged to the expected final text.
    FinalOutputObserved,
}

impl IncrementalState {
    /// The state that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::PartiallyTyped),
            Self::PartiallyTyped => Some(Self::IntermediateOutputObserved),
            Self::IntermediateOutputObserved => Some(Self::FullyTyped),
            Self::FullyTyped => Some(Self::FinalOutputObserved),
            Self::FinalOutputObserved => None,
        }
    }
}

/// Outcome of executing one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedResult {
    /// Id of the executed case
    pub case_id: String,
    /// Label of the executed case
    pub label: String,
    /// Category of the executed case
    pub category: String,
    /// Suite the case belongs to
    pub suite: Suite,
    /// Expected output text
    pub expected: String,
    /// Output text read at the end of the case (empty if never read)
    pub actual_output: String,
    /// Whether the output matched exactly
    pub passed: bool,
    /// Wall-clock duration of the case
    pub elapsed_ms: u64,
    /// Failure classification, if the case failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Human-readable failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Last scenario state reached (incremental cases only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reached_state: Option<IncrementalState>,
    /// Reviewer note carried over from the fixture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
}
