//! # FilterSink — forward some kinds, swallow the rest.
//!
//! A delegating link that forwards events passing a predicate to its inner
//! consumer and swallows everything else. Swallowed events answer `true`
//! (a filtered-out event is not a cancellation request).

use std::sync::Arc;

use crate::events::{Event, Group};
use crate::sinks::Sink;

/// Delegating sink that filters by predicate before forwarding.
///
/// Stateless apart from the predicate; reentrant by construction.
pub struct FilterSink {
    inner: Arc<dyn Sink>,
    allow: Box<dyn Fn(&Event) -> bool + Send + Sync>,
}

impl FilterSink {
    /// Creates a filter forwarding events for which `allow` answers `true`.
    pub fn new(
        inner: Arc<dyn Sink>,
        allow: impl Fn(&Event) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            allow: Box::new(allow),
        }
    }

    /// Creates a filter forwarding only events in the given capability groups.
    pub fn groups(inner: Arc<dyn Sink>, groups: &[Group]) -> Self {
        let groups = groups.to_vec();
        Self::new(inner, move |event| groups.contains(&event.group()))
    }
}

impl Sink for FilterSink {
    fn on_event(&self, event: &Event) -> bool {
        if (self.allow)(event) {
            self.inner.on_event(event)
        } else {
            true
        }
    }

    fn name(&self) -> &'static str {
        "filter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::Mutex;

    struct Collecting {
        kinds: Mutex<Vec<EventKind>>,
        keep: bool,
    }

    impl Collecting {
        fn new(keep: bool) -> Arc<Self> {
            Arc::new(Self {
                kinds: Mutex::new(Vec::new()),
                keep,
            })
        }
    }

    impl Sink for Collecting {
        fn on_event(&self, event: &Event) -> bool {
            self.kinds.lock().unwrap().push(event.kind());
            self.keep
        }
    }

    #[test]
    fn test_swallowed_events_answer_continue() {
        let inner = Collecting::new(false);
        let filter = FilterSink::groups(inner.clone(), &[Group::Discovery]);

        // Filtered out: inner never sees it, answer stays true.
        assert!(filter.on_event(&Event::diagnostic("noise")));
        assert!(inner.kinds.lock().unwrap().is_empty());

        // Forwarded: the inner answer comes through.
        let complete = Event::DiscoveryComplete {
            assembly_id: "a".into(),
        };
        assert!(!filter.on_event(&complete));
        assert_eq!(
            *inner.kinds.lock().unwrap(),
            vec![EventKind::DiscoveryComplete]
        );
    }
}
