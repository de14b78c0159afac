//! Access to the translator's input and output regions.
//!
//! The harness never talks to a browser directly: the verification driver
//! goes through [`ControlAdapter`], and the runner obtains one adapter per
//! case from a [`SessionFactory`].

pub mod chromium;
pub mod simulated;

use async_trait::async_trait;
use std::time::Duration;
use transcheck_core::Result;

pub use chromium::{ChromiumAdapter, ChromiumSessionFactory};
pub use simulated::{SimulatedBehavior, SimulatedSessions, SimulatedTranslator};

/// Operations on the two regions of one translator page.
///
/// Every method mutates or reads the live page; callers must await one call
/// before issuing the next on the same adapter.
#[async_trait]
pub trait ControlAdapter: Send + Sync {
    /// Empty the input region.
    ///
    /// Returns once the control reports empty content.
    ///
    /// # Errors
    /// `ControlNotFound` if the input region cannot be located
    async fn clear(&self) -> Result<()>;

    /// Replace the input content in a single operation.
    ///
    /// # Errors
    /// `ControlNotFound` if the input region cannot be located
    async fn set_text(&self, text: &str) -> Result<()>;

    /// Append `text` one character at a time, pausing `per_char_delay` between characters.
    ///
    /// # Errors
    /// `ControlNotFound` if the input region cannot be located
    async fn type_incremental(&self, text: &str, per_char_delay: Duration) -> Result<()>;

    /// Current trimmed text of the output region, or an empty string.
    ///
    /// # Errors
    /// `Session` if the page can no longer be queried
    async fn read_output(&self) -> Result<String>;

    /// Monotonic change counter of the output region, when the adapter can observe changes.
    ///
    /// # Errors
    /// `Session` if the page can no longer be queried
    async fn output_revision(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Opens an isolated adapter per case and releases it afterwards.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Adapter type handed to the verification driver.
    type Adapter: ControlAdapter;

    /// Open a fresh session with both regions located.
    ///
    /// # Errors
    /// `ControlNotFound` if a region is missing, `Session` if the page fails to load
    async fn open_session(&self) -> Result<Self::Adapter>;

    /// Release a session opened by [`Self::open_session`].
    ///
    /// # Errors
    /// `Session` if the underlying page cannot be closed
    async fn close_session(&self, adapter: Self::Adapter) -> Result<()>;
}
