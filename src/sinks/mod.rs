//! # Event sinks: terminal consumers and delegating chain links.
//!
//! This module provides the [`Sink`] trait and composable links for wrapping
//! a terminal consumer with extra behavior without changing the producer.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Bus ── dispatch ──► SourceRewriteSink ──► FilterSink ──► TeeSink ──┬──► ReportAggregator
//!                        (transform)           (filter)      (fork)    └──► LogSink / custom
//! ```
//!
//! ## Link types
//! - [`FilterSink`] — forwards matching kinds, swallows the rest
//! - [`TeeSink`] — forks to multiple consumers, ANDs their answers
//! - [`SourceRewriteSink`] — enriches discovered tests with source info
//! - `LogSink` (feature `logging`) — stdout printer for demos
//!
//! Links hold their inner consumers behind `Arc` and never own them, so
//! dropping a chain cannot double-release a consumer that is also tracked by
//! a [`ResourceLedger`](crate::ledger::ResourceLedger).

mod filter;
#[cfg(feature = "logging")]
mod log;
mod sink;
mod source_info;
mod tee;

pub use filter::FilterSink;
#[cfg(feature = "logging")]
pub use log::LogSink;
pub use sink::Sink;
pub use source_info::SourceRewriteSink;
pub use tee::TeeSink;
