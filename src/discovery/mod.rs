//! Test discovery: driver and input collaborators.
//!
//! This module walks a set of candidate test containers and publishes a
//! structured discovery event sequence through the bus, recovering from
//! per-container failures without aborting the run.
//!
//! ## Contents
//! - [`DiscoveryDriver`] background discovery with cooperative cancellation
//! - [`ContainerSource`], [`TestContainer`], [`TestUnit`] the introspection
//!   surface supplied by the embedding runner
//! - [`SourceProvider`], [`NullSourceProvider`] source-location resolution

mod driver;
mod source;

pub use driver::DiscoveryDriver;
pub use source::{
    ContainerSource, EnumerationError, NullSourceProvider, SourceProvider, TestContainer, TestUnit,
};
