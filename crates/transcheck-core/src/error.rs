use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for harness operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while driving and verifying the translator UI.
#[derive(Debug, Error)]
pub enum Error {
    /// The input or output region could not be located, or matched ambiguously.
    #[error("Control not found: {0}")]
    ControlNotFound(String),

    /// The output region stayed empty for the whole convergence budget.
    #[error("Output did not converge within {waited_ms}ms")]
    ConvergenceTimeout {
        /// How long the detector waited before giving up.
        waited_ms: u64,
    },

    /// The output settled but differs from the expected text.
    #[error("Output mismatch: expected {expected:?}, got {actual:?}")]
    AssertionMismatch {
        /// Expected output text.
        expected: String,
        /// Observed output text.
        actual: String,
    },

    /// The browser session failed (launch, navigation, or protocol error).
    #[error("Browser session error: {0}")]
    Session(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fixture data is malformed or violates an invariant.
    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl Error {
    /// Returns the report kind for errors that are recorded against a single case.
    ///
    /// Returns `None` for errors that prevent the run from starting at all.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ControlNotFound(_) => Some(ErrorKind::ControlNotFound),
            Self::ConvergenceTimeout { .. } => Some(ErrorKind::ConvergenceTimeout),
            Self::AssertionMismatch { .. } => Some(ErrorKind::AssertionMismatch),
            Self::Session(_) => Some(ErrorKind::Session),
            Self::Io(_) | Self::Json(_) | Self::Toml(_) | Self::Config(_) | Self::Fixture(_) => {
                None
            }
        }
    }
}

/// Failure classification attached to a failed case in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input or output region missing or ambiguous.
    ControlNotFound,
    /// Output never appeared within the budget.
    ConvergenceTimeout,
    /// Output settled to the wrong text.
    AssertionMismatch,
    /// Browser or protocol failure outside the harness's control.
    Session,
}

impl ErrorKind {
    /// Stable label used in report lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::ControlNotFound => "ControlNotFoundError",
            Self::ConvergenceTimeout => "ConvergenceTimeoutError",
            Self::AssertionMismatch => "AssertionMismatchError",
            Self::Session => "SessionError",
        }
    }
}
