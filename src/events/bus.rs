//! # Event bus: typed publish/dispatch with advisory cancellation.
//!
//! [`Bus`] delivers each published [`Event`] to every subscriber whose
//! declared [`Group`] set contains the event's group, in registration order,
//! and aggregates the subscribers' continue/cancel answers into a single
//! boolean.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Subscribers (ordered):
//!   DiscoveryDriver ──┐
//!   Execution engine ─┼──► Bus ── dispatch ──► sink 1 ─► bool ┐
//!   ...              ──┘                  ──► sink 2 ─► bool ┼─ AND ─► publish result
//!                                         ──► sink N ─► bool ┘
//! ```
//!
//! ## Delivery modes
//! - **Immediate** ([`Bus::immediate`]): handlers run on the publishing
//!   thread before `publish` returns. The returned boolean reflects this
//!   event's delivery. Handlers must be fast or internally thread-safe,
//!   since multiple producer threads may publish concurrently.
//! - **Queued** ([`Bus::queued`]): events are enqueued and delivered from a
//!   single dedicated worker in strict FIFO order. `publish` returns once the
//!   enqueue succeeds, so a cancellation requested by a handler is only
//!   visible to *later* publishes; hot loops must also poll
//!   [`Bus::is_cancelled`].
//!
//! ## Rules
//! - Cancellation is advisory: a `false` answer from one sink does not skip
//!   the remaining sinks for that event, and already-enqueued events are
//!   still delivered. A well-behaved producer checks the result after every
//!   publish and stops producing when it sees `false`.
//! - Publishing or subscribing after [`Bus::dispose`] fails with
//!   [`BusError::Disposed`].
//! - Disposing the queued bus drains and waits for all already-enqueued
//!   events before releasing the worker.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::BusError;
use crate::events::{Event, Group};
use crate::config::{DeliveryMode, PipelineConfig};
use crate::sinks::Sink;

/// One registered subscriber with its declared capability groups.
#[derive(Clone)]
struct Registration {
    name: &'static str,
    groups: Vec<Group>,
    sink: Arc<dyn Sink>,
}

struct BusShared {
    registrations: RwLock<Vec<Registration>>,
    cancelled: AtomicBool,
    disposed: AtomicBool,
    /// Present in queued mode until disposal.
    queue: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    /// Worker handle, joined on disposal.
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// In-process publish/dispatch bus for lifecycle events.
///
/// Cheap to clone (internally `Arc`-backed); clones share subscribers, the
/// cancellation flag, and the delivery queue.
#[derive(Clone)]
pub struct Bus {
    shared: Arc<BusShared>,
}

impl Bus {
    /// Creates a bus that runs handlers inline on the publishing thread.
    pub fn immediate() -> Self {
        Self {
            shared: Arc::new(BusShared {
                registrations: RwLock::new(Vec::new()),
                cancelled: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                queue: Mutex::new(None),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Creates a bus that delivers from a dedicated background worker in
    /// strict FIFO order.
    ///
    /// Must be called inside a tokio runtime (the worker is a spawned task).
    pub fn queued() -> Self {
        let bus = Self::immediate();
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let shared = Arc::clone(&bus.shared);
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !dispatch_isolated(&shared, &event) {
                    shared.cancelled.store(true, Ordering::SeqCst);
                }
            }
        });

        *lock(&bus.shared.queue) = Some(tx);
        *lock(&bus.shared.worker) = Some(worker);
        bus
    }

    /// Creates a bus with the delivery mode picked by `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        match config.delivery {
            DeliveryMode::Immediate => Self::immediate(),
            DeliveryMode::Queued => Self::queued(),
        }
    }

    /// Registers a sink for the given capability groups.
    ///
    /// Subscribers are invoked in registration order; a sink registered for
    /// no groups is never invoked.
    pub fn subscribe(&self, sink: Arc<dyn Sink>, groups: &[Group]) -> Result<(), BusError> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(BusError::Disposed);
        }
        let name = sink.name();
        self.shared
            .registrations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration {
                name,
                groups: groups.to_vec(),
                sink,
            });
        Ok(())
    }

    /// Publishes one event.
    ///
    /// Returns `Ok(true)` when producing may continue, `Ok(false)` when the
    /// bus was already cancelled or a handler requested cancellation, and
    /// `Err(BusError::Disposed)` after disposal.
    ///
    /// In queued mode the handler answers for *this* event are not yet known
    /// when `publish` returns; the result only reflects cancellations
    /// observed so far.
    pub fn publish(&self, event: Event) -> Result<bool, BusError> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(BusError::Disposed);
        }

        let sender = lock(&self.shared.queue).clone();
        match sender {
            Some(tx) => {
                if tx.send(event).is_err() {
                    return Err(BusError::Disposed);
                }
                Ok(!self.shared.cancelled.load(Ordering::SeqCst))
            }
            None => {
                let was_cancelled = self.shared.cancelled.load(Ordering::SeqCst);
                let keep_running = dispatch(&self.shared, &event);
                let result = keep_running && !was_cancelled;
                if !result {
                    self.shared.cancelled.store(true, Ordering::SeqCst);
                }
                Ok(result)
            }
        }
    }

    /// Returns `true` once any handler has requested cancellation.
    ///
    /// Producers on a queued bus must poll this in tight loops instead of
    /// relying solely on the publish result.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Disposes the bus.
    ///
    /// In queued mode this drains and waits for all already-enqueued events,
    /// then releases the worker. Afterwards every publish or subscribe fails
    /// with [`BusError::Disposed`]; a repeat dispose fails the same way.
    pub async fn dispose(&self) -> Result<(), BusError> {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return Err(BusError::Disposed);
        }

        // Closing the sender lets the worker drain the backlog and exit.
        drop(lock(&self.shared.queue).take());
        let worker = lock(&self.shared.worker).take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Snapshots the registrations so sinks run outside the lock.
fn matching(shared: &BusShared, group: Group) -> Vec<Registration> {
    shared
        .registrations
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .filter(|r| r.groups.contains(&group))
        .cloned()
        .collect()
}

/// Delivers `event` to every matching sink; returns the AND of their answers.
fn dispatch(shared: &BusShared, event: &Event) -> bool {
    let mut keep_running = true;
    for registration in matching(shared, event.group()) {
        keep_running &= registration.sink.on_event(event);
    }
    keep_running
}

/// Worker-side delivery: a panicking sink must not kill the worker, so each
/// call is unwound and reported to the diagnostics sinks.
fn dispatch_isolated(shared: &BusShared, event: &Event) -> bool {
    let mut keep_running = true;
    let mut panics = Vec::new();
    for registration in matching(shared, event.group()) {
        match catch_unwind(AssertUnwindSafe(|| registration.sink.on_event(event))) {
            Ok(cont) => keep_running &= cont,
            Err(payload) => panics.push((registration.name, panic_text(payload))),
        }
    }

    for (name, info) in panics {
        let diagnostic = Event::diagnostic(format!("sink '{name}' panicked: {info}"));
        for registration in matching(shared, Group::Diagnostics) {
            let _ = catch_unwind(AssertUnwindSafe(|| registration.sink.on_event(&diagnostic)));
        }
    }
    keep_running
}

fn panic_text(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
