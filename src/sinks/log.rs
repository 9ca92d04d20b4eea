//! # LogSink — simple event printer
//!
//! A minimal terminal sink that prints incoming [`Event`]s to stdout.
//! Use it for test or demo.
//!
//! ## Example output
//! ```text
//! [discovery-starting] assembly="demo"
//! [discovered] test="Demo::adds"
//! [discovery-complete]
//! [passed] test="Demo::adds" time=0.012
//! [failed] test="Demo::overflows" time=0.003
//! [diagnostic] Exception during discovery: ...
//! ```

use crate::events::Event;
use crate::sinks::Sink;

/// Event writer sink. Always answers continue.
#[derive(Default)]
pub struct LogSink;

impl LogSink {
    /// Construct a new [`LogSink`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Sink for LogSink {
    fn on_event(&self, e: &Event) -> bool {
        match e {
            Event::DiscoveryStarting { assembly_name, .. } => {
                println!("[discovery-starting] assembly={assembly_name:?}");
            }
            Event::TestCaseDiscovered { test } => {
                println!("[discovered] test={:?}", test.display_name);
            }
            Event::DiscoveryComplete { .. } => {
                println!("[discovery-complete]");
            }
            Event::TestPassed {
                test,
                execution_time,
                ..
            } => {
                println!("[passed] test={:?} time={execution_time}", test.display_name);
            }
            Event::TestFailed {
                test,
                execution_time,
                failure,
                ..
            } => {
                println!(
                    "[failed] test={:?} time={execution_time} err={:?}",
                    test.display_name,
                    failure.root_type().unwrap_or("unknown"),
                );
            }
            Event::TestSkipped { test, reason, .. } => {
                println!("[skipped] test={:?} reason={reason:?}", test.display_name);
            }
            Event::DiagnosticMessage { message } => {
                println!("[diagnostic] {message}");
            }
            Event::ErrorMessage { failure } => {
                println!("[error] {}", failure.combined_message());
            }
            other => {
                println!("[{:?}]", other.kind());
            }
        }
        true
    }

    fn name(&self) -> &'static str {
        "LogSink"
    }
}
