//! # ResourceLedger — deterministic, once-only resource release.
//!
//! Tracks resources acquired during discovery or execution (buses, loggers,
//! test-class instances) and guarantees they are released exactly once, in
//! the reverse of the order they were added.
//!
//! ## Rules
//! - Once added, the ledger shares responsibility for release; the original
//!   owner must not release the resource independently.
//! - [`ResourceLedger::teardown`] releases all async-capable entries first
//!   (reverse add order), then all sync-capable entries (reverse add order).
//!   Asynchronous release is assumed to guard state the synchronous release
//!   depends on being finalized; this ordering is a fixed contract.
//! - A release failure propagates to the teardown caller. The ledger marks
//!   itself torn down before rethrowing, so a repeat teardown fails with
//!   [`LedgerError::TornDown`] instead of running releases again.
//! - All mutating operations are mutually exclusive via one internal lock;
//!   release calls themselves run outside the lock.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{LedgerError, ReleaseError};

/// Synchronous release capability.
pub trait Release: Send + Sync {
    /// Releases the resource. Called at most once by the ledger.
    fn release(&self) -> Result<(), ReleaseError>;
}

/// Asynchronous release capability.
#[async_trait]
pub trait AsyncRelease: Send + Sync {
    /// Releases the resource. Called at most once by the ledger.
    async fn release(&self) -> Result<(), ReleaseError>;
}

/// A resource handed to the ledger, tagged by its release capabilities.
///
/// Exposing neither capability ([`TrackedResource::Inert`]) is legal and is
/// a silent no-op; exposing both adds the resource to both internal stacks.
pub enum TrackedResource {
    /// No release capability; accepted and dropped.
    Inert,
    /// Synchronous release only.
    Sync(Arc<dyn Release>),
    /// Asynchronous release only.
    Async(Arc<dyn AsyncRelease>),
    /// Both capabilities on one object.
    Both {
        sync: Arc<dyn Release>,
        r#async: Arc<dyn AsyncRelease>,
    },
}

#[derive(Default)]
struct LedgerState {
    torn_down: bool,
    /// Push order; teardown walks in reverse.
    sync_stack: Vec<Arc<dyn Release>>,
    /// Push order; teardown walks in reverse, before the sync stack.
    async_stack: Vec<Arc<dyn AsyncRelease>>,
}

/// Reverse-order, once-only disposal of tracked resources.
#[derive(Default)]
pub struct ResourceLedger {
    state: Mutex<LedgerState>,
}

impl ResourceLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource to be released at teardown.
    ///
    /// Fails with [`LedgerError::TornDown`] after teardown.
    pub fn add(&self, resource: TrackedResource) -> Result<(), LedgerError> {
        let mut state = self.guarded()?;
        match resource {
            TrackedResource::Inert => {}
            TrackedResource::Sync(sync) => state.sync_stack.push(sync),
            TrackedResource::Async(r#async) => state.async_stack.push(r#async),
            TrackedResource::Both { sync, r#async } => {
                state.sync_stack.push(sync);
                state.async_stack.push(r#async);
            }
        }
        Ok(())
    }

    /// Adds a resource with only a synchronous release capability.
    pub fn add_sync(&self, resource: Arc<dyn Release>) -> Result<(), LedgerError> {
        self.add(TrackedResource::Sync(resource))
    }

    /// Adds a resource with only an asynchronous release capability.
    pub fn add_async(&self, resource: Arc<dyn AsyncRelease>) -> Result<(), LedgerError> {
        self.add(TrackedResource::Async(resource))
    }

    /// Atomically snapshots and clears the synchronous entries.
    ///
    /// The snapshot is in push order (most recently added last), for callers
    /// that manage release timing themselves. Repeated calls return empty
    /// snapshots, never duplicates.
    pub fn drain_sync(&self) -> Result<Vec<Arc<dyn Release>>, LedgerError> {
        let mut state = self.guarded()?;
        Ok(std::mem::take(&mut state.sync_stack))
    }

    /// Atomically snapshots and clears the asynchronous entries.
    ///
    /// Same ordering and repeat-call behavior as
    /// [`drain_sync`](Self::drain_sync).
    pub fn drain_async(&self) -> Result<Vec<Arc<dyn AsyncRelease>>, LedgerError> {
        let mut state = self.guarded()?;
        Ok(std::mem::take(&mut state.async_stack))
    }

    /// Releases everything: async-capable entries in reverse add order, then
    /// sync-capable entries in reverse add order.
    ///
    /// The ledger is marked torn down before any release runs; a release
    /// failure propagates as [`LedgerError::ReleaseFailed`] and the remaining
    /// entries are not released. Repeat calls fail with
    /// [`LedgerError::TornDown`].
    pub async fn teardown(&self) -> Result<(), LedgerError> {
        let (async_entries, sync_entries) = {
            let mut state = self.guarded()?;
            state.torn_down = true;
            (
                std::mem::take(&mut state.async_stack),
                std::mem::take(&mut state.sync_stack),
            )
        };

        for resource in async_entries.iter().rev() {
            resource
                .release()
                .await
                .map_err(|source| LedgerError::ReleaseFailed { source })?;
        }
        for resource in sync_entries.iter().rev() {
            resource
                .release()
                .map_err(|source| LedgerError::ReleaseFailed { source })?;
        }
        Ok(())
    }

    fn guarded(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.torn_down {
            return Err(LedgerError::TornDown);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    type Log = Arc<StdMutex<Vec<String>>>;

    struct Recorded {
        label: String,
        log: Log,
        fail: bool,
    }

    impl Recorded {
        fn arc(label: &str, log: &Log) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                log: log.clone(),
                fail: false,
            })
        }

        fn failing(label: &str, log: &Log) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                log: log.clone(),
                fail: true,
            })
        }
    }

    impl Release for Recorded {
        fn release(&self) -> Result<(), ReleaseError> {
            self.log.lock().unwrap().push(format!("sync:{}", self.label));
            if self.fail {
                return Err(format!("{} refused", self.label).into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AsyncRelease for Recorded {
        async fn release(&self) -> Result<(), ReleaseError> {
            self.log.lock().unwrap().push(format!("async:{}", self.label));
            if self.fail {
                return Err(format!("{} refused", self.label).into());
            }
            Ok(())
        }
    }

    fn log() -> Log {
        Arc::new(StdMutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_teardown_releases_async_then_sync_in_reverse_order() {
        let log = log();
        let ledger = ResourceLedger::new();
        ledger.add_sync(Recorded::arc("a", &log)).unwrap();
        ledger.add_async(Recorded::arc("b", &log)).unwrap();
        ledger.add_sync(Recorded::arc("c", &log)).unwrap();
        ledger.add_async(Recorded::arc("d", &log)).unwrap();

        ledger.teardown().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["async:d", "async:b", "sync:c", "sync:a"]
        );
    }

    #[tokio::test]
    async fn test_repeat_teardown_fails_without_re_releasing() {
        let log = log();
        let ledger = ResourceLedger::new();
        ledger.add_sync(Recorded::arc("a", &log)).unwrap();

        ledger.teardown().await.unwrap();
        let err = ledger.teardown().await.unwrap_err();
        assert_eq!(err.as_label(), "ledger_torn_down");
        // The resource was released exactly once.
        assert_eq!(*log.lock().unwrap(), vec!["sync:a"]);
    }

    #[tokio::test]
    async fn test_add_after_teardown_fails() {
        let log = log();
        let ledger = ResourceLedger::new();
        ledger.teardown().await.unwrap();

        let err = ledger.add_sync(Recorded::arc("late", &log)).unwrap_err();
        assert!(matches!(err, LedgerError::TornDown));
        assert!(matches!(
            ledger.drain_sync().err().unwrap(),
            LedgerError::TornDown
        ));
    }

    #[test]
    fn test_drain_returns_push_order_then_empties() {
        let log = log();
        let ledger = ResourceLedger::new();
        ledger.add_sync(Recorded::arc("first", &log)).unwrap();
        ledger.add_sync(Recorded::arc("second", &log)).unwrap();

        let drained = ledger.drain_sync().unwrap();
        assert_eq!(drained.len(), 2);
        // Push order: most recently added last.
        drained[0].release().unwrap();
        drained[1].release().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["sync:first", "sync:second"]);

        assert!(ledger.drain_sync().unwrap().is_empty());
        assert!(ledger.drain_async().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_both_capability_joins_both_stacks() {
        let log = log();
        let ledger = ResourceLedger::new();
        let resource = Recorded::arc("r", &log);
        ledger
            .add(TrackedResource::Both {
                sync: resource.clone(),
                r#async: resource,
            })
            .unwrap();

        ledger.teardown().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["async:r", "sync:r"]);
    }

    #[tokio::test]
    async fn test_inert_resource_is_silent_noop() {
        let ledger = ResourceLedger::new();
        ledger.add(TrackedResource::Inert).unwrap();
        ledger.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_failure_propagates_after_torn_down_mark() {
        let log = log();
        let ledger = ResourceLedger::new();
        ledger.add_sync(Recorded::arc("early", &log)).unwrap();
        ledger.add_sync(Recorded::failing("broken", &log)).unwrap();

        let err = ledger.teardown().await.unwrap_err();
        assert_eq!(err.as_label(), "ledger_release_failed");
        // The failing entry ran; the earlier one was abandoned, not retried.
        assert_eq!(*log.lock().unwrap(), vec!["sync:broken"]);

        // Torn down despite the failure.
        assert!(matches!(
            ledger.teardown().await.unwrap_err(),
            LedgerError::TornDown
        ));
    }
}
