//! Lifecycle events: data model and publish/dispatch bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish lifecycle events emitted by discovery and execution.
//!
//! ## Contents
//! - [`Event`], [`EventKind`], [`Group`] event classification and payloads
//! - [`ScopeIds`], [`TestMeta`], [`FailureInfo`], [`RunTotals`],
//!   [`ScopeTotals`], [`SourceLocation`] shared payload types
//! - [`Bus`] fan-out with advisory cancellation, immediate or queued delivery
//!
//! ## Quick reference
//! - **Publishers**: `DiscoveryDriver`, the execution engine (external).
//! - **Consumers**: anything implementing [`Sink`](crate::sinks::Sink),
//!   typically a chain ending in
//!   [`ReportAggregator`](crate::report::ReportAggregator).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{
    Event, EventKind, FailureInfo, Group, RunTotals, ScopeIds, ScopeTotals, SourceLocation,
    TestMeta,
};
