//! Fixture loading, validation and discovery.

use crate::error::{Error, Result};
use crate::types::{IncrementalTestCase, Suite, TestCase};
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in positive cases
const BUILTIN_POSITIVE: &str = include_str!("../fixtures/positive.json");
/// Built-in negative cases
const BUILTIN_NEGATIVE: &str = include_str!("../fixtures/negative.json");
/// Built-in incremental cases
const BUILTIN_INCREMENTAL: &str = include_str!("../fixtures/incremental.json");

/// On-disk fixture document. Every suite key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureFile {
    /// Cases the translator should handle
    pub positive: Vec<TestCase>,
    /// Cases documenting known limitations
    pub negative: Vec<TestCase>,
    /// Typed-in-two-halves cases
    pub incremental: Vec<IncrementalTestCase>,
}

/// Borrowed view of one case, tagged with how it must be driven.
#[derive(Debug, Clone, Copy)]
pub enum FixtureRef<'set> {
    /// Whole input set at once
    Bulk {
        /// Suite the case came from
        suite: Suite,
        /// The case
        case: &'set TestCase,
    },
    /// Typed incrementally with an intermediate observation
    Incremental(&'set IncrementalTestCase),
}

impl<'set> FixtureRef<'set> {
    /// Case id.
    pub fn id(&self) -> &'set str {
        match self {
            Self::Bulk { case, .. } => &case.id,
            Self::Incremental(case) => &case.id,
        }
    }

    /// Case label.
    pub fn label(&self) -> &'set str {
        match self {
            Self::Bulk { case, .. } => &case.label,
            Self::Incremental(case) => &case.label,
        }
    }

    /// Report category.
    pub fn category(&self) -> &'set str {
        match self {
            Self::Bulk { case, .. } => &case.category,
            Self::Incremental(case) => &case.category,
        }
    }

    /// Suite the case belongs to.
    pub fn suite(&self) -> Suite {
        match self {
            Self::Bulk { suite, .. } => *suite,
            Self::Incremental(_) => Suite::Incremental,
        }
    }

    /// Reviewer note, if the fixture is flagged.
    pub fn review_note(&self) -> Option<&'set str> {
        match self {
            Self::Bulk { case, .. } => case.review_note.as_deref(),
            Self::Incremental(case) => case.review_note.as_deref(),
        }
    }
}

/// Validated, read-only collection of all cases.
#[derive(Debug, Clone, Default)]
pub struct FixtureSet {
    positive: Vec<TestCase>,
    negative: Vec<TestCase>,
    incremental: Vec<IncrementalTestCase>,
}

impl FixtureSet {
    /// The suite compiled into the crate.
    ///
    /// # Errors
    /// Returns error if the embedded fixtures fail to parse or validate
    pub fn builtin() -> Result<Self> {
        let files = [BUILTIN_POSITIVE, BUILTIN_NEGATIVE, BUILTIN_INCREMENTAL]
            .into_iter()
            .map(parse_fixture)
            .collect::<Result<Vec<_>>>()?;
        Self::from_files(files)
    }

    /// Merge fixture documents in order and validate the result.
    ///
    /// # Errors
    /// Returns error if any invariant is violated
    pub fn from_files(files: Vec<FixtureFile>) -> Result<Self> {
        let mut set = Self::default();
        for file in files {
            set.positive.extend(file.positive);
            set.negative.extend(file.negative);
            set.incremental.extend(file.incremental);
        }
        set.validate()?;

        for entry in set.select(&Suite::ALL, None) {
            if let Some(note) = entry.review_note() {
                tracing::warn!("Fixture {} is flagged for review: {note}", entry.id());
            }
        }
        Ok(set)
    }

    /// Load every `*.json` fixture below `dir`, in path order.
    ///
    /// # Errors
    /// Returns error if discovery, reading, parsing or validation fails
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::Fixture(format!(
                "Fixture directory not found: {}",
                dir.display()
            )));
        }
        let paths = discover_fixtures(dir)?;
        if paths.is_empty() {
            return Err(Error::Fixture(format!(
                "No fixture files in {}",
                dir.display()
            )));
        }
        let files = paths
            .iter()
            .map(|path| load_fixture(path))
            .collect::<Result<Vec<_>>>()?;
        Self::from_files(files)
    }

    /// Check id uniqueness, non-empty inputs and incremental prefixes.
    ///
    /// # Errors
    /// Returns a `Fixture` error naming the offending case
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in self.select(&Suite::ALL, None) {
            if !seen.insert(entry.id()) {
                return Err(Error::Fixture(format!("Duplicate case id: {}", entry.id())));
            }
        }

        for case in self.positive.iter().chain(&self.negative) {
            if case.input.is_empty() {
                return Err(Error::Fixture(format!("Case {} has empty input", case.id)));
            }
        }

        for case in &self.incremental {
            if !case.has_valid_prefix() {
                return Err(Error::Fixture(format!(
                    "Case {}: partial_input {:?} must be a strict non-empty prefix of input {:?}",
                    case.id, case.partial_input, case.input
                )));
            }
        }
        Ok(())
    }

    /// Cases of the requested suites (in `Suite::ALL` order) whose id contains `filter`.
    pub fn select(&self, suites: &[Suite], filter: Option<&str>) -> Vec<FixtureRef<'_>> {
        let mut selected = Vec::new();
        for suite in Suite::ALL {
            if !suites.contains(&suite) {
                continue;
            }
            match suite {
                Suite::Positive => selected.extend(
                    self.positive
                        .iter()
                        .map(|case| FixtureRef::Bulk { suite, case }),
                ),
                Suite::Negative => selected.extend(
                    self.negative
                        .iter()
                        .map(|case| FixtureRef::Bulk { suite, case }),
                ),
                Suite::Incremental => {
                    selected.extend(self.incremental.iter().map(FixtureRef::Incremental));
                }
            }
        }

        if let Some(pattern) = filter {
            selected.retain(|entry| entry.id().contains(pattern));
        }
        selected
    }

    /// Look up a bulk case by id.
    pub fn case(&self, id: &str) -> Option<&TestCase> {
        self.positive
            .iter()
            .chain(&self.negative)
            .find(|case| case.id == id)
    }

    /// Look up an incremental case by id.
    pub fn incremental_case(&self, id: &str) -> Option<&IncrementalTestCase> {
        self.incremental.iter().find(|case| case.id == id)
    }

    /// Total number of cases.
    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len() + self.incremental.len()
    }

    /// Whether the set holds no cases.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a fixture document.
///
/// # Errors
/// Returns error if the JSON is malformed
fn parse_fixture(content: &str) -> Result<FixtureFile> {
    Ok(from_str(content)?)
}

/// Load a fixture document from a JSON file
///
/// # Errors
/// Returns error if file reading or parsing fails
pub fn load_fixture(path: &Path) -> Result<FixtureFile> {
    let content = fs::read_to_string(path).map_err(|err| {
        Error::Fixture(format!("Failed to read fixture {}: {err}", path.display()))
    })?;
    from_str(&content).map_err(|err| {
        Error::Fixture(format!("Failed to parse fixture {}: {err}", path.display()))
    })
}

/// Discover all fixtures in directory, sorted by path
///
/// # Errors
/// Returns error if directory reading fails
pub fn discover_fixtures(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut fixtures = Vec::new();

    if !dir.exists() {
        return Ok(fixtures);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            fixtures.push(path);
        } else if path.is_dir() {
            // Recurse into subdirectories
            fixtures.append(&mut discover_fixtures(&path)?);
        }
    }

    fixtures.sort();
    Ok(fixtures)
}
