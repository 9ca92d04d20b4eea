//! # Core sink trait
//!
//! `Sink` is the extension point for plugging event consumers into the
//! pipeline, whether terminal (a report builder, a logger) or delegating (a
//! chain link wrapping an inner consumer).
//!
//! ## Contract
//! - `on_event` answers `true` to continue the run, `false` to request
//!   cooperative cancellation. The answer is advisory; producers observe it
//!   through the bus publish result.
//! - Handlers registered on an immediate bus run on whichever thread
//!   published, possibly from several threads at once. Implementations must
//!   be fast or internally thread-safe; stateful sinks serialize access.
//! - A delegating sink holds its inner consumer behind `Arc` and does **not**
//!   own it: dropping the link must not release an inner consumer that is
//!   also tracked by a resource ledger.
//!
//! ## Example (skeleton)
//! ```rust
//! use testvisor::{Event, EventKind, Sink};
//!
//! struct FailureCounter(std::sync::atomic::AtomicU64);
//!
//! impl Sink for FailureCounter {
//!     fn on_event(&self, event: &Event) -> bool {
//!         if event.kind() == EventKind::TestFailed {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!         true
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "failure-counter"
//!     }
//! }
//! ```

use crate::events::Event;

/// Contract for event consumers and chain links.
pub trait Sink: Send + Sync + 'static {
    /// Handles a single event.
    ///
    /// Returns `true` to continue the run, `false` to request cancellation.
    fn on_event(&self, event: &Event) -> bool;

    /// Human-readable name (for logs/diagnostics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
