//! # TeeSink — fork one event stream to several consumers.
//!
//! A delegating link that hands every event to each of its inner consumers
//! and combines their continue/cancel answers with AND. Every inner consumer
//! sees every event; a `false` from one does not short-circuit the others
//! (the same rule the bus applies across subscribers).

use std::sync::Arc;

use crate::events::Event;
use crate::sinks::Sink;

/// Delegating sink that forks events to multiple inner consumers.
pub struct TeeSink {
    inners: Vec<Arc<dyn Sink>>,
}

impl TeeSink {
    /// Creates a fork over the given consumers.
    ///
    /// An empty fork is legal and always answers `true`.
    pub fn new(inners: Vec<Arc<dyn Sink>>) -> Self {
        Self { inners }
    }
}

impl Sink for TeeSink {
    fn on_event(&self, event: &Event) -> bool {
        let mut keep_running = true;
        for inner in &self.inners {
            keep_running &= inner.on_event(event);
        }
        keep_running
    }

    fn name(&self) -> &'static str {
        "tee"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        keep: bool,
    }

    impl Counting {
        fn new(keep: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                keep,
            })
        }
    }

    impl Sink for Counting {
        fn on_event(&self, _event: &Event) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.keep
        }
    }

    #[test]
    fn test_all_inners_see_event_and_answers_are_anded() {
        let cancelling = Counting::new(false);
        let continuing = Counting::new(true);
        let tee = TeeSink::new(vec![cancelling.clone(), continuing.clone()]);

        assert!(!tee.on_event(&Event::diagnostic("x")));
        assert_eq!(cancelling.calls.load(Ordering::SeqCst), 1);
        assert_eq!(continuing.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_fork_continues() {
        let tee = TeeSink::new(Vec::new());
        assert!(tee.on_event(&Event::diagnostic("x")));
    }
}
