//! # Discovery input collaborators.
//!
//! The traits the discovery driver consumes. The underlying introspection
//! layer (how an assembly enumerates its containers, how a container
//! enumerates its test units) lives behind these traits and is not part of
//! this crate.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::events::SourceLocation;

/// Boxed error produced while enumerating a container's test units.
pub type EnumerationError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One discoverable test unit, as reported by its container.
#[derive(Debug, Clone)]
pub struct TestUnit {
    /// Human-readable display name.
    pub display_name: Arc<str>,
    /// Name of the test method, if applicable.
    pub method_name: Option<Arc<str>>,
    /// Source location, when the container already knows it.
    pub source: Option<SourceLocation>,
    /// Trait key to multi-value pairs.
    pub traits: BTreeMap<String, Vec<String>>,
}

/// A candidate test container (typically a test class).
pub trait TestContainer: Send + Sync {
    /// Fully-qualified container name.
    fn name(&self) -> &str;

    /// Whether the container is abstract.
    fn is_abstract(&self) -> bool {
        false
    }

    /// Whether the container is sealed (no subtypes; abstract-and-sealed
    /// means static-only).
    fn is_sealed(&self) -> bool {
        false
    }

    /// Display name of the collection this container belongs to, when it
    /// declares one.
    fn collection_name(&self) -> Option<&str> {
        None
    }

    /// Enumerates the container's test units.
    ///
    /// A failure here aborts only this container, never the run.
    fn test_units(&self) -> Result<Vec<TestUnit>, EnumerationError>;
}

/// An assembly handle: supplies candidate containers and identity metadata.
pub trait ContainerSource: Send + Sync {
    /// Stable unique id for the assembly, unique within the run.
    fn unique_id(&self) -> Arc<str>;

    /// Human-readable assembly name.
    fn name(&self) -> &str;

    /// On-disk location, when known. Discovery pins the working directory to
    /// this location's parent for its duration.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Configuration file associated with the assembly, when any.
    fn config_file(&self) -> Option<&str> {
        None
    }

    /// All candidate containers, in a stable order.
    fn containers(&self) -> Vec<Arc<dyn TestContainer>>;

    /// Looks up one container by fully-qualified name.
    fn container(&self, name: &str) -> Option<Arc<dyn TestContainer>>;
}

/// Resolves source locations for discovered tests.
pub trait SourceProvider: Send + Sync {
    /// Returns the source location for a class/method pair; an empty
    /// location means "unknown".
    fn source_for(&self, class_name: &str, method_name: &str) -> SourceLocation;
}

/// A [`SourceProvider`] that never resolves anything.
///
/// Useful for runners that do not need, or cannot provide, source
/// information during discovery.
#[derive(Default)]
pub struct NullSourceProvider;

impl SourceProvider for NullSourceProvider {
    fn source_for(&self, _class_name: &str, _method_name: &str) -> SourceLocation {
        SourceLocation::default()
    }
}
