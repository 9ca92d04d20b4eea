//! # DiscoveryDriver — walk containers and publish what they hold.
//!
//! Iterates an assembly's candidate test containers, asks each for its test
//! units and publishes the starting/found*/complete sequence through the
//! [`Bus`]. Discovery is deliberately partial-failure-tolerant: one broken
//! container must not abort the run.
//!
//! ## Event flow
//! ```text
//! find_all():
//!   publish DiscoveryStarting
//!   for each container passing the validity predicate:
//!     ├─ test_units() ─ Ok(units) ──► publish TestCaseDiscovered per unit
//!     │                               └─ publish returned false ─► cancel, stop
//!     └─ test_units() ─ Err(e) ─────► publish DiagnosticMessage, continue
//!   publish DiscoveryComplete        (always, even after cancel/failure)
//! ```
//!
//! ## Rules
//! - Runs on dedicated background work; the caller's thread is not blocked.
//! - The working directory is pinned to the assembly's location for the
//!   duration and restored afterward, also on the error path.
//! - A `false` publish result cancels the driver's token so cooperating
//!   loops elsewhere observe it, and stops enumerating further containers
//!   immediately.
//! - Default validity predicate: concrete, or abstract-and-sealed
//!   (static-only) containers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::discovery::source::{ContainerSource, SourceProvider, TestContainer};
use crate::error::BusError;
use crate::events::{Bus, Event, ScopeIds, SourceLocation, TestMeta};

/// Composes a child scope id from its parent id and own name.
fn scope_id(parent: &str, name: &str) -> Arc<str> {
    Arc::from(format!("{parent}::{name}"))
}

/// What a discovery pass covers.
enum Selection {
    All,
    Named(String),
}

/// Walks candidate containers and publishes discovery events.
#[derive(Clone)]
pub struct DiscoveryDriver {
    source: Arc<dyn ContainerSource>,
    bus: Bus,
    config: PipelineConfig,
    source_provider: Option<Arc<dyn SourceProvider>>,
    validity: Arc<dyn Fn(&dyn TestContainer) -> bool + Send + Sync>,
    token: CancellationToken,
}

impl DiscoveryDriver {
    /// Creates a driver over `source`, publishing into `bus`.
    pub fn new(source: Arc<dyn ContainerSource>, bus: Bus, config: PipelineConfig) -> Self {
        Self {
            source,
            bus,
            config,
            source_provider: None,
            validity: Arc::new(default_validity),
            token: CancellationToken::new(),
        }
    }

    /// Attaches a provider used to resolve missing source locations before
    /// publishing, when the configuration asks for source information.
    #[must_use]
    pub fn with_source_provider(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.source_provider = Some(provider);
        self
    }

    /// Replaces the container validity predicate.
    #[must_use]
    pub fn with_validity(
        mut self,
        predicate: impl Fn(&dyn TestContainer) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validity = Arc::new(predicate);
        self
    }

    /// The driver's cooperative cancellation token.
    ///
    /// Cancelled by the driver itself when a publish reports `false`;
    /// cooperating loops elsewhere can watch or cancel it too.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Discovers the whole assembly on background work.
    pub fn find_all(&self) -> JoinHandle<Result<(), BusError>> {
        let driver = self.clone();
        tokio::task::spawn_blocking(move || driver.run(Selection::All))
    }

    /// Discovers exactly one named container on background work, for
    /// targeted re-discovery. Unknown or invalid containers yield only the
    /// starting/complete pair.
    pub fn find_container(&self, name: &str) -> JoinHandle<Result<(), BusError>> {
        let driver = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || driver.run(Selection::Named(name)))
    }

    fn run(&self, selection: Selection) -> Result<(), BusError> {
        let assembly_id = self.source.unique_id();
        let _workdir = WorkingDirGuard::pin(self.source.path());

        let starting = Event::DiscoveryStarting {
            assembly_id: assembly_id.clone(),
            assembly_name: Arc::from(self.source.name()),
            assembly_path: self
                .source
                .path()
                .map(|p| Arc::from(p.to_string_lossy().as_ref())),
            config_file: self.source.config_file().map(Arc::from),
        };

        let result = match self.bus.publish(starting) {
            Ok(true) => self.discover(selection, &assembly_id),
            Ok(false) => {
                self.token.cancel();
                Ok(())
            }
            Err(err) => Err(err),
        };

        // The completion event is published even after cancellation or
        // partial failure, so consumers always observe a well-defined end.
        let complete = self.bus.publish(Event::DiscoveryComplete {
            assembly_id: assembly_id.clone(),
        });
        result.and(complete.map(|_| ()))
    }

    fn discover(&self, selection: Selection, assembly_id: &Arc<str>) -> Result<(), BusError> {
        match selection {
            Selection::All => {
                for container in self.source.containers() {
                    if self.token.is_cancelled() || self.bus.is_cancelled() {
                        break;
                    }
                    if !(self.validity)(container.as_ref()) {
                        continue;
                    }
                    if !self.discover_container(container.as_ref(), assembly_id)? {
                        break;
                    }
                }
            }
            Selection::Named(name) => {
                if let Some(container) = self.source.container(&name) {
                    if (self.validity)(container.as_ref()) {
                        self.discover_container(container.as_ref(), assembly_id)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Publishes every unit of one container. Returns `Ok(false)` when
    /// enumeration of further containers must stop.
    fn discover_container(
        &self,
        container: &dyn TestContainer,
        assembly_id: &Arc<str>,
    ) -> Result<bool, BusError> {
        let collection_display = container
            .collection_name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Test collection for {}", self.source.name()));
        let collection_id = scope_id(assembly_id, &collection_display);
        let class_id = scope_id(&collection_id, container.name());

        let units = match container.test_units() {
            Ok(units) => units,
            Err(err) => {
                let keep = self
                    .bus
                    .publish(Event::diagnostic(format!("Exception during discovery:\n{err}")))?;
                if !keep {
                    self.token.cancel();
                    return Ok(false);
                }
                // Keep going on to the next container.
                return Ok(true);
            }
        };

        for unit in units {
            if self.token.is_cancelled() || self.bus.is_cancelled() {
                return Ok(false);
            }

            let method_id = unit
                .method_name
                .as_deref()
                .map(|method| scope_id(&class_id, method));
            let case_id = scope_id(
                method_id.as_deref().unwrap_or(class_id.as_ref()),
                &unit.display_name,
            );
            let ids = ScopeIds {
                assembly: assembly_id.clone(),
                collection: Some(collection_id.clone()),
                class: Some(class_id.clone()),
                method: method_id,
                case: Some(case_id),
                test: None,
            };

            let source = self.resolve_source(container, &unit.method_name, unit.source);
            let discovered = Event::TestCaseDiscovered {
                test: TestMeta {
                    ids,
                    display_name: unit.display_name,
                    class_name: Some(Arc::from(container.name())),
                    method_name: unit.method_name,
                    source,
                    traits: unit.traits,
                },
            };

            if !self.bus.publish(discovered)? {
                self.token.cancel();
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fills in a missing source location when configured to and a provider
    /// is attached; locations the container already knows are kept.
    fn resolve_source(
        &self,
        container: &dyn TestContainer,
        method_name: &Option<Arc<str>>,
        known: Option<SourceLocation>,
    ) -> Option<SourceLocation> {
        if known.as_ref().map_or(false, |s| !s.is_empty()) {
            return known;
        }
        if !self.config.include_source_info {
            return known;
        }
        let provider = self.source_provider.as_ref()?;
        let method = method_name.as_deref()?;
        let resolved = provider.source_for(container.name(), method);
        if resolved.is_empty() {
            known
        } else {
            Some(resolved)
        }
    }
}

/// Default container validity: concrete, or abstract-and-sealed
/// (static-only).
fn default_validity(container: &dyn TestContainer) -> bool {
    !container.is_abstract() || container.is_sealed()
}

/// Pins the working directory to the assembly's directory and restores the
/// previous one on drop, also when discovery exits through an error.
struct WorkingDirGuard {
    original: Option<PathBuf>,
}

impl WorkingDirGuard {
    fn pin(assembly_path: Option<&Path>) -> Self {
        let original = std::env::current_dir().ok();
        if let Some(dir) = assembly_path.and_then(Path::parent) {
            if !dir.as_os_str().is_empty() {
                let _ = std::env::set_current_dir(dir);
            }
        }
        Self { original }
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Some(original) = &self.original {
            let _ = std::env::set_current_dir(original);
        }
    }
}
