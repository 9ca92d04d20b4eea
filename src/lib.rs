//! # testvisor
//!
//! **Testvisor** is the event backbone of a test-execution engine.
//!
//! It provides the primitives a runner needs to stream a well-defined
//! sequence of lifecycle events (discovery found a test; a test started,
//! passed, failed, was skipped; a scope started or finished; cleanup failed)
//! to one or more consumers, while guaranteeing ordered teardown of tracked
//! resources and allowing any consumer to request early cancellation.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌─────────────────┐      ┌───────────────────┐
//!     │ DiscoveryDriver │      │ Execution engine  │
//!     │  (this crate)   │      │   (external)      │
//!     └────────┬────────┘      └─────────┬─────────┘
//!              │ publish(Event) → bool   │
//!              ▼                         ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  Bus                                                      │
//! │  - immediate mode: handlers run on the publishing thread  │
//! │  - queued mode: one worker drains a FIFO queue            │
//! │  - answers = AND of every subscriber's continue/cancel    │
//! └──────┬──────────────────────┬─────────────────────┬───────┘
//!        ▼                      ▼                     ▼
//!  SourceRewriteSink       FilterSink              LogSink
//!        │ (transform)        │ (filter)          (feature)
//!        ▼                    ▼
//!     TeeSink ──────────► ReportAggregator ──► report document
//!      (fork)              (assembly → collection → test tree)
//!
//!  ResourceLedger: used by any component that acquires releasable
//!  resources; releases async entries then sync entries, each in
//!  reverse add order, exactly once.
//! ```
//!
//! ### Cancellation
//! Cancellation is cooperative and advisory: a consumer answers `false`
//! from its handler, the bus folds that into the publish result, and a
//! well-behaved producer checks the result after every publish and stops.
//! The discovery driver additionally cancels its
//! [`CancellationToken`](tokio_util::sync::CancellationToken) so loops
//! elsewhere observe the request.
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                        |
//! |-----------------|---------------------------------------------------------|-------------------------------------------|
//! | **Events**      | Closed set of lifecycle records and capability groups.  | [`Event`], [`EventKind`], [`Group`]       |
//! | **Bus**         | Typed fan-out with advisory cancellation.               | [`Bus`]                                   |
//! | **Sinks**       | Terminal consumers and delegating chain links.          | [`Sink`], [`FilterSink`], [`TeeSink`]     |
//! | **Reporting**   | Stateful aggregation into a serialized run report.      | [`ReportAggregator`]                      |
//! | **Resources**   | Deterministic reverse-order, once-only release.         | [`ResourceLedger`], [`TrackedResource`]   |
//! | **Discovery**   | Background container walking, partial-failure tolerant. | [`DiscoveryDriver`], [`ContainerSource`]  |
//! | **Errors**      | Fail-fast protocol violations, typed release failures.  | [`BusError`], [`LedgerError`]             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogSink` _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use testvisor::{Bus, Event, Group, ReportAggregator, RunTotals, ScopeIds, TestMeta};
//!
//! fn main() -> Result<(), testvisor::BusError> {
//!     let bus = Bus::immediate();
//!     let report = Arc::new(ReportAggregator::new());
//!     bus.subscribe(report.clone(), &[Group::Execution, Group::Diagnostics])?;
//!
//!     let ids = ScopeIds::assembly("asm").with_collection("asm::main");
//!     let mut keep = bus.publish(Event::CollectionStarting {
//!         ids: ids.clone(),
//!         display_name: "main".into(),
//!     })?;
//!     keep &= bus.publish(Event::TestPassed {
//!         test: TestMeta {
//!             ids: ids.clone(),
//!             display_name: "adds".into(),
//!             class_name: Some("Calculator".into()),
//!             method_name: Some("adds".into()),
//!             source: None,
//!             traits: BTreeMap::new(),
//!         },
//!         execution_time: 0.012,
//!         output: "".into(),
//!     })?;
//!     keep &= bus.publish(Event::AssemblyFinished {
//!         ids,
//!         totals: RunTotals {
//!             total: 1,
//!             failed: 0,
//!             skipped: 0,
//!             errors: 0,
//!             time: 0.012,
//!         },
//!     })?;
//!     assert!(keep);
//!
//!     println!("{}", report.xml());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod ledger;
pub mod report;
pub mod sinks;

// ---- Public re-exports ----

pub use config::{DeliveryMode, PipelineConfig};
pub use discovery::{
    ContainerSource, DiscoveryDriver, EnumerationError, NullSourceProvider, SourceProvider,
    TestContainer, TestUnit,
};
pub use error::{BusError, LedgerError, ReleaseError};
pub use events::{
    Bus, Event, EventKind, FailureInfo, Group, RunTotals, ScopeIds, ScopeTotals, SourceLocation,
    TestMeta,
};
pub use ledger::{AsyncRelease, Release, ResourceLedger, TrackedResource};
pub use report::ReportAggregator;
pub use sinks::{FilterSink, Sink, SourceRewriteSink, TeeSink};

// Optional: expose a simple built-in stdout sink (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use sinks::LogSink;
