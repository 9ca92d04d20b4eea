//! Error types used by the event pipeline.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`] — protocol violations against the event bus.
//! - [`LedgerError`] — protocol violations and release failures in the
//!   resource ledger.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics. Cancellation is **not** an error anywhere in this crate:
//! it is surfaced as a `bool` from publish calls.

use thiserror::Error;

/// Boxed error produced by a resource release implementation.
///
/// Release failures are arbitrary user errors; the ledger wraps them in
/// [`LedgerError::ReleaseFailed`] when they surface during teardown.
pub type ReleaseError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the event bus.
///
/// These represent misuse of the bus lifecycle, never cancellation (which is
/// advisory and reported through the publish return value).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The bus was disposed; no further publishes or subscriptions are accepted.
    #[error("bus is disposed; event rejected")]
    Disposed,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use testvisor::BusError;
    ///
    /// assert_eq!(BusError::Disposed.as_label(), "bus_disposed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Disposed => "bus_disposed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::Disposed => "bus already disposed; event rejected".to_string(),
        }
    }
}

/// # Errors produced by the resource ledger.
///
/// Operating on a torn-down ledger fails fast; a failing release propagates
/// to the teardown caller instead of being swallowed or retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger was already torn down; no further operations are accepted.
    #[error("resource ledger is already torn down")]
    TornDown,

    /// A tracked resource failed to release during teardown.
    ///
    /// The ledger marks itself torn down before the error propagates, so a
    /// repeat teardown reports [`LedgerError::TornDown`] rather than running
    /// releases again.
    #[error("release failed during teardown: {source}")]
    ReleaseFailed {
        /// The underlying release error.
        #[source]
        source: ReleaseError,
    },
}

impl LedgerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use testvisor::LedgerError;
    ///
    /// assert_eq!(LedgerError::TornDown.as_label(), "ledger_torn_down");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LedgerError::TornDown => "ledger_torn_down",
            LedgerError::ReleaseFailed { .. } => "ledger_release_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LedgerError::TornDown => "ledger already torn down".to_string(),
            LedgerError::ReleaseFailed { source } => format!("release failed: {source}"),
        }
    }
}
