//! Resource tracking: deterministic reverse-order teardown.
//!
//! This module provides [`ResourceLedger`], used by any component that
//! acquires releasable resources during discovery or execution to guarantee
//! cleanup ordering regardless of how the operation exits.
//!
//! ## Contents
//! - [`Release`] / [`AsyncRelease`] the resource release protocol
//! - [`TrackedResource`] capability-tagged ledger entry
//! - [`ResourceLedger`] the tracker itself

mod tracker;

pub use tracker::{AsyncRelease, Release, ResourceLedger, TrackedResource};
