//! # SourceRewriteSink — enrich discovered tests with source locations.
//!
//! A delegating link that fills in missing source file/line information on
//! `TestCaseDiscovered` events before forwarding them. Every other kind
//! passes through untouched, as do cases that already carry source
//! information. Stateless, so reentrant across concurrent publishers.

use std::sync::Arc;

use crate::discovery::SourceProvider;
use crate::events::{Event, SourceLocation};
use crate::sinks::Sink;

/// Delegating sink that resolves missing source info before forwarding.
pub struct SourceRewriteSink {
    inner: Arc<dyn Sink>,
    provider: Arc<dyn SourceProvider>,
}

impl SourceRewriteSink {
    /// Creates a rewrite link over `inner` using `provider` for resolution.
    pub fn new(inner: Arc<dyn Sink>, provider: Arc<dyn SourceProvider>) -> Self {
        Self { inner, provider }
    }
}

impl Sink for SourceRewriteSink {
    fn on_event(&self, event: &Event) -> bool {
        if let Event::TestCaseDiscovered { test } = event {
            let missing = test.source.as_ref().map_or(true, SourceLocation::is_empty);
            if missing {
                if let (Some(class), Some(method)) = (&test.class_name, &test.method_name) {
                    let resolved = self.provider.source_for(class, method);
                    if !resolved.is_empty() {
                        let mut enriched = test.clone();
                        enriched.source = Some(resolved);
                        return self.inner.on_event(&Event::TestCaseDiscovered { test: enriched });
                    }
                }
            }
        }
        self.inner.on_event(event)
    }

    fn name(&self) -> &'static str {
        "source-rewrite"
    }
}
