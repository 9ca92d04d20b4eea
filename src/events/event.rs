//! # Lifecycle events emitted during test discovery and execution.
//!
//! [`Event`] is a closed set of lifecycle records: discovery found a test, a
//! test started/passed/failed/was skipped, a scope started or finished,
//! cleanup failed, diagnostics. Each variant carries the identifiers of every
//! enclosing scope it belongs to (see [`ScopeIds`]) plus kind-specific
//! payload. Adding a kind is a compile-time exhaustiveness change, never a
//! runtime registration.
//!
//! [`EventKind`] is the plain discriminator and [`Group`] partitions kinds
//! into the capability groups subscribers register for:
//! - **Diagnostics**: free-form messages and run-level errors
//! - **Discovery**: the starting/found*/complete sequence
//! - **Execution**: scope lifecycle, test outcomes, cleanup failures
//! - **Runner**: run-level summaries
//!
//! ## Ordering guarantees
//! Within one producer, every `*Finished` event for a scope is preceded by
//! exactly one matching `*Starting` event. Across producers no relative order
//! is guaranteed; consumers match finish events to starts by unique id, not
//! by arrival order.
//!
//! ## Example
//! ```rust
//! use testvisor::{Event, EventKind, Group, ScopeIds};
//!
//! let ids = ScopeIds::assembly("asm-1").with_collection("asm-1::c");
//! let ev = Event::CollectionStarting {
//!     ids,
//!     display_name: "My collection".into(),
//! };
//!
//! assert_eq!(ev.kind(), EventKind::CollectionStarting);
//! assert_eq!(ev.group(), Group::Execution);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Discovery ===
    DiscoveryStarting,
    TestCaseDiscovered,
    DiscoveryComplete,

    // === Execution: scopes ===
    AssemblyStarting,
    AssemblyFinished,
    CollectionStarting,
    CollectionFinished,
    ClassStarting,
    ClassFinished,
    MethodStarting,
    MethodFinished,
    CaseStarting,
    CaseFinished,

    // === Execution: tests ===
    TestStarting,
    TestPassed,
    TestFailed,
    TestSkipped,
    TestFinished,

    // === Execution: cleanup failures ===
    AssemblyCleanupFailure,
    CollectionCleanupFailure,
    ClassCleanupFailure,
    MethodCleanupFailure,
    CaseCleanupFailure,
    TestCleanupFailure,

    // === Diagnostics ===
    DiagnosticMessage,
    ErrorMessage,

    // === Runner ===
    ExecutionSummary,
}

/// Capability group a subscriber registers for.
///
/// The bus only invokes a subscriber for events whose group is in the set it
/// declared at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    /// Free-form diagnostics and run-level error reports.
    Diagnostics,
    /// The discovery starting/found*/complete sequence.
    Discovery,
    /// Scope lifecycle, test outcomes, cleanup failures.
    Execution,
    /// Run-level summary events.
    Runner,
}

impl Group {
    /// All capability groups, in a stable order.
    pub const ALL: [Group; 4] = [
        Group::Diagnostics,
        Group::Discovery,
        Group::Execution,
        Group::Runner,
    ];
}

/// Opaque identifiers for every scope enclosing an event.
///
/// Each id is a stable string unique within the run. The assembly id is
/// always present; narrower scopes are filled in as applicable.
#[derive(Debug, Clone, Default)]
pub struct ScopeIds {
    /// Unique id of the test assembly.
    pub assembly: Arc<str>,
    /// Unique id of the test collection, if applicable.
    pub collection: Option<Arc<str>>,
    /// Unique id of the test class, if applicable.
    pub class: Option<Arc<str>>,
    /// Unique id of the test method, if applicable.
    pub method: Option<Arc<str>>,
    /// Unique id of the test case, if applicable.
    pub case: Option<Arc<str>>,
    /// Unique id of the test, if applicable.
    pub test: Option<Arc<str>>,
}

impl ScopeIds {
    /// Creates ids rooted at the given assembly.
    pub fn assembly(id: impl Into<Arc<str>>) -> Self {
        Self {
            assembly: id.into(),
            ..Self::default()
        }
    }

    /// Attaches a collection id.
    #[inline]
    pub fn with_collection(mut self, id: impl Into<Arc<str>>) -> Self {
        self.collection = Some(id.into());
        self
    }

    /// Attaches a class id.
    #[inline]
    pub fn with_class(mut self, id: impl Into<Arc<str>>) -> Self {
        self.class = Some(id.into());
        self
    }

    /// Attaches a method id.
    #[inline]
    pub fn with_method(mut self, id: impl Into<Arc<str>>) -> Self {
        self.method = Some(id.into());
        self
    }

    /// Attaches a test-case id.
    #[inline]
    pub fn with_case(mut self, id: impl Into<Arc<str>>) -> Self {
        self.case = Some(id.into());
        self
    }

    /// Attaches a test id.
    #[inline]
    pub fn with_test(mut self, id: impl Into<Arc<str>>) -> Self {
        self.test = Some(id.into());
        self
    }
}

/// Source file/line a test was resolved to.
#[derive(Debug, Clone, Default)]
pub struct SourceLocation {
    /// Source file name.
    pub file: Option<Arc<str>>,
    /// 1-based line number.
    pub line: Option<u32>,
}

impl SourceLocation {
    /// Returns `true` when neither file nor line is known.
    pub fn is_empty(&self) -> bool {
        self.file.as_deref().map_or(true, |f| f.trim().is_empty()) && self.line.is_none()
    }
}

/// Identity and metadata of a single test, shared by discovery and outcome
/// events.
#[derive(Debug, Clone)]
pub struct TestMeta {
    /// Identifiers of every enclosing scope.
    pub ids: ScopeIds,
    /// Human-readable display name.
    pub display_name: Arc<str>,
    /// Fully-qualified name of the containing class, if known.
    pub class_name: Option<Arc<str>>,
    /// Name of the test method, if known.
    pub method_name: Option<Arc<str>>,
    /// Resolved source location, if known.
    pub source: Option<SourceLocation>,
    /// Trait key to multi-value pairs attached to the test.
    pub traits: BTreeMap<String, Vec<String>>,
}

/// Failure detail as parallel arrays describing a tree of exceptions.
///
/// Entry `i` of each array describes one exception; `parent_indices[i]` gives
/// the index of its parent, or [`FailureInfo::NO_PARENT`] for a root. The
/// arrays are index-aligned; missing type names or stack traces are `None`.
#[derive(Debug, Clone, Default)]
pub struct FailureInfo {
    /// Exception type names, one per entry.
    pub exception_types: Vec<Option<Arc<str>>>,
    /// Exception messages, one per entry.
    pub messages: Vec<Arc<str>>,
    /// Stack traces, one per entry.
    pub stack_traces: Vec<Option<Arc<str>>>,
    /// Parent index per entry; [`FailureInfo::NO_PARENT`] marks a root.
    pub parent_indices: Vec<i32>,
}

impl FailureInfo {
    /// Sentinel parent index marking a root exception.
    pub const NO_PARENT: i32 = -1;

    /// Creates failure detail for a single, non-nested exception.
    pub fn single(
        type_name: impl Into<Arc<str>>,
        message: impl Into<Arc<str>>,
        stack_trace: Option<Arc<str>>,
    ) -> Self {
        Self {
            exception_types: vec![Some(type_name.into())],
            messages: vec![message.into()],
            stack_traces: vec![stack_trace],
            parent_indices: vec![Self::NO_PARENT],
        }
    }

    /// Type name of the first root exception, if any.
    pub fn root_type(&self) -> Option<&str> {
        self.root_indices()
            .next()
            .and_then(|i| self.exception_types.get(i))
            .and_then(|t| t.as_deref())
    }

    /// Combines all entries into "`type` : `message`" lines, walking the
    /// exception tree depth-first from each root so parents precede children.
    pub fn combined_message(&self) -> String {
        let mut lines = Vec::with_capacity(self.messages.len());
        self.walk(|i| {
            let message = self.messages.get(i).map(Arc::as_ref).unwrap_or_default();
            match self.exception_types.get(i).and_then(|t| t.as_deref()) {
                Some(type_name) => lines.push(format!("{type_name} : {message}")),
                None => lines.push(message.to_string()),
            }
        });
        lines.join("\n")
    }

    /// Combines all non-empty stack traces in the same parent-then-child
    /// order as [`combined_message`](Self::combined_message).
    pub fn combined_stack_trace(&self) -> String {
        let mut traces = Vec::new();
        self.walk(|i| {
            if let Some(trace) = self.stack_traces.get(i).and_then(|t| t.as_deref()) {
                if !trace.is_empty() {
                    traces.push(trace.to_string());
                }
            }
        });
        traces.join("\n")
    }

    fn root_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.parent_indices
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == Self::NO_PARENT)
            .map(|(i, _)| i)
    }

    /// Visits every entry depth-first from each root, in index order.
    fn walk(&self, mut visit: impl FnMut(usize)) {
        fn descend(info: &FailureInfo, index: usize, visit: &mut impl FnMut(usize)) {
            visit(index);
            for (child, parent) in info.parent_indices.iter().enumerate() {
                if *parent == index as i32 {
                    descend(info, child, visit);
                }
            }
        }
        for root in self.root_indices().collect::<Vec<_>>() {
            descend(self, root, &mut visit);
        }
    }
}

/// Authoritative counters for a finished run or assembly.
///
/// `passed` is never stored; it is always derived as
/// `total - failed - skipped`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    /// Total number of tests.
    pub total: u64,
    /// Number of failed tests.
    pub failed: u64,
    /// Number of skipped tests.
    pub skipped: u64,
    /// Number of run-level errors.
    pub errors: u64,
    /// Elapsed time in seconds.
    pub time: f64,
}

impl RunTotals {
    /// Number of passed tests, derived from the stored counters.
    #[inline]
    pub fn passed(&self) -> u64 {
        self.total.saturating_sub(self.failed).saturating_sub(self.skipped)
    }
}

/// Authoritative counters for a finished non-assembly scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeTotals {
    /// Total number of tests in the scope.
    pub total: u64,
    /// Number of failed tests.
    pub failed: u64,
    /// Number of skipped tests.
    pub skipped: u64,
    /// Elapsed time in seconds.
    pub time: f64,
}

impl ScopeTotals {
    /// Number of passed tests, derived from the stored counters.
    #[inline]
    pub fn passed(&self) -> u64 {
        self.total.saturating_sub(self.failed).saturating_sub(self.skipped)
    }
}

/// One lifecycle record.
///
/// Every variant is immutable once published. Free text (display names,
/// output, messages, reasons) is carried verbatim; escaping for strict
/// document consumers happens at serialization time, never at capture time.
#[derive(Debug, Clone)]
pub enum Event {
    /// Discovery is starting for an assembly.
    DiscoveryStarting {
        assembly_id: Arc<str>,
        assembly_name: Arc<str>,
        assembly_path: Option<Arc<str>>,
        config_file: Option<Arc<str>>,
    },
    /// Discovery found one test case.
    TestCaseDiscovered { test: TestMeta },
    /// Discovery finished for an assembly. Published unconditionally, even
    /// after cancellation or partial failure.
    DiscoveryComplete { assembly_id: Arc<str> },

    /// Execution of an assembly is starting.
    AssemblyStarting {
        ids: ScopeIds,
        assembly_name: Arc<str>,
        assembly_path: Option<Arc<str>>,
        config_file: Option<Arc<str>>,
        start_time: Option<DateTime<Utc>>,
        target_framework: Option<Arc<str>>,
        environment: Option<Arc<str>>,
        test_framework: Option<Arc<str>>,
    },
    /// Execution of an assembly finished, with the authoritative run totals.
    AssemblyFinished { ids: ScopeIds, totals: RunTotals },

    /// A test collection is starting.
    CollectionStarting { ids: ScopeIds, display_name: Arc<str> },
    /// A test collection finished, with authoritative counters.
    CollectionFinished { ids: ScopeIds, totals: ScopeTotals },

    /// A test class is starting.
    ClassStarting { ids: ScopeIds, class_name: Arc<str> },
    /// A test class finished.
    ClassFinished { ids: ScopeIds, totals: ScopeTotals },

    /// A test method is starting.
    MethodStarting { ids: ScopeIds, method_name: Arc<str> },
    /// A test method finished.
    MethodFinished { ids: ScopeIds, totals: ScopeTotals },

    /// A test case is starting.
    CaseStarting { ids: ScopeIds, display_name: Arc<str> },
    /// A test case finished.
    CaseFinished { ids: ScopeIds, totals: ScopeTotals },

    /// A test is starting.
    TestStarting { ids: ScopeIds, display_name: Arc<str> },
    /// A test passed.
    TestPassed {
        test: TestMeta,
        execution_time: f64,
        output: Arc<str>,
    },
    /// A test failed.
    TestFailed {
        test: TestMeta,
        execution_time: f64,
        output: Arc<str>,
        failure: FailureInfo,
    },
    /// A test was skipped.
    TestSkipped {
        test: TestMeta,
        execution_time: f64,
        output: Arc<str>,
        reason: Arc<str>,
    },
    /// A test finished (terminal bookkeeping after the outcome event).
    TestFinished {
        ids: ScopeIds,
        execution_time: f64,
        output: Arc<str>,
    },

    /// Cleanup of an assembly failed.
    AssemblyCleanupFailure { ids: ScopeIds, failure: FailureInfo },
    /// Cleanup of a test collection failed.
    CollectionCleanupFailure { ids: ScopeIds, failure: FailureInfo },
    /// Cleanup of a test class failed.
    ClassCleanupFailure { ids: ScopeIds, failure: FailureInfo },
    /// Cleanup of a test method failed.
    MethodCleanupFailure { ids: ScopeIds, failure: FailureInfo },
    /// Cleanup of a test case failed.
    CaseCleanupFailure { ids: ScopeIds, failure: FailureInfo },
    /// Cleanup of a test failed.
    TestCleanupFailure { ids: ScopeIds, failure: FailureInfo },

    /// Free-form diagnostic text (discovery exceptions, subscriber panics).
    DiagnosticMessage { message: Arc<str> },
    /// A run-level error with full failure detail.
    ErrorMessage { failure: FailureInfo },

    /// Run-level summary: one totals entry per assembly, keyed by assembly id.
    ExecutionSummary { summaries: Vec<(Arc<str>, RunTotals)> },
}

impl Event {
    /// Creates a diagnostic message event.
    #[inline]
    pub fn diagnostic(message: impl Into<Arc<str>>) -> Self {
        Event::DiagnosticMessage {
            message: message.into(),
        }
    }

    /// Returns the kind discriminator for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DiscoveryStarting { .. } => EventKind::DiscoveryStarting,
            Event::TestCaseDiscovered { .. } => EventKind::TestCaseDiscovered,
            Event::DiscoveryComplete { .. } => EventKind::DiscoveryComplete,
            Event::AssemblyStarting { .. } => EventKind::AssemblyStarting,
            Event::AssemblyFinished { .. } => EventKind::AssemblyFinished,
            Event::CollectionStarting { .. } => EventKind::CollectionStarting,
            Event::CollectionFinished { .. } => EventKind::CollectionFinished,
            Event::ClassStarting { .. } => EventKind::ClassStarting,
            Event::ClassFinished { .. } => EventKind::ClassFinished,
            Event::MethodStarting { .. } => EventKind::MethodStarting,
            Event::MethodFinished { .. } => EventKind::MethodFinished,
            Event::CaseStarting { .. } => EventKind::CaseStarting,
            Event::CaseFinished { .. } => EventKind::CaseFinished,
            Event::TestStarting { .. } => EventKind::TestStarting,
            Event::TestPassed { .. } => EventKind::TestPassed,
            Event::TestFailed { .. } => EventKind::TestFailed,
            Event::TestSkipped { .. } => EventKind::TestSkipped,
            Event::TestFinished { .. } => EventKind::TestFinished,
            Event::AssemblyCleanupFailure { .. } => EventKind::AssemblyCleanupFailure,
            Event::CollectionCleanupFailure { .. } => EventKind::CollectionCleanupFailure,
            Event::ClassCleanupFailure { .. } => EventKind::ClassCleanupFailure,
            Event::MethodCleanupFailure { .. } => EventKind::MethodCleanupFailure,
            Event::CaseCleanupFailure { .. } => EventKind::CaseCleanupFailure,
            Event::TestCleanupFailure { .. } => EventKind::TestCleanupFailure,
            Event::DiagnosticMessage { .. } => EventKind::DiagnosticMessage,
            Event::ErrorMessage { .. } => EventKind::ErrorMessage,
            Event::ExecutionSummary { .. } => EventKind::ExecutionSummary,
        }
    }

    /// Returns the capability group this event belongs to.
    pub fn group(&self) -> Group {
        self.kind().group()
    }
}

impl EventKind {
    /// Returns the capability group this kind belongs to.
    pub fn group(&self) -> Group {
        match self {
            EventKind::DiagnosticMessage | EventKind::ErrorMessage => Group::Diagnostics,
            EventKind::DiscoveryStarting
            | EventKind::TestCaseDiscovered
            | EventKind::DiscoveryComplete => Group::Discovery,
            EventKind::ExecutionSummary => Group::Runner,
            _ => Group::Execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_partition_kinds() {
        assert_eq!(EventKind::DiagnosticMessage.group(), Group::Diagnostics);
        assert_eq!(EventKind::ErrorMessage.group(), Group::Diagnostics);
        assert_eq!(EventKind::DiscoveryStarting.group(), Group::Discovery);
        assert_eq!(EventKind::TestCaseDiscovered.group(), Group::Discovery);
        assert_eq!(EventKind::DiscoveryComplete.group(), Group::Discovery);
        assert_eq!(EventKind::ExecutionSummary.group(), Group::Runner);
        assert_eq!(EventKind::TestPassed.group(), Group::Execution);
        assert_eq!(EventKind::AssemblyCleanupFailure.group(), Group::Execution);
    }

    #[test]
    fn test_totals_derive_passed() {
        let totals = RunTotals {
            total: 2112,
            failed: 42,
            skipped: 6,
            errors: 1,
            time: 123.4567,
        };
        assert_eq!(totals.passed(), 2064);

        let underflow = RunTotals {
            total: 1,
            failed: 2,
            skipped: 0,
            errors: 0,
            time: 0.0,
        };
        assert_eq!(underflow.passed(), 0);
    }

    #[test]
    fn test_combined_message_parent_then_child() {
        let failure = FailureInfo {
            exception_types: vec![Some("Outer".into()), Some("Inner".into())],
            messages: vec!["outer failed".into(), "inner failed".into()],
            stack_traces: vec![None, None],
            parent_indices: vec![FailureInfo::NO_PARENT, 0],
        };
        assert_eq!(
            failure.combined_message(),
            "Outer : outer failed\nInner : inner failed"
        );
        assert_eq!(failure.root_type(), Some("Outer"));
    }

    #[test]
    fn test_combined_message_orders_children_under_their_root() {
        // Two roots, each with one child; children interleaved in the arrays.
        let failure = FailureInfo {
            exception_types: vec![
                Some("RootA".into()),
                Some("RootB".into()),
                Some("ChildB".into()),
                Some("ChildA".into()),
            ],
            messages: vec!["a".into(), "b".into(), "cb".into(), "ca".into()],
            stack_traces: vec![None, None, None, None],
            parent_indices: vec![FailureInfo::NO_PARENT, FailureInfo::NO_PARENT, 1, 0],
        };
        assert_eq!(
            failure.combined_message(),
            "RootA : a\nChildA : ca\nRootB : b\nChildB : cb"
        );
    }

    #[test]
    fn test_combined_stack_trace_skips_missing_entries() {
        let failure = FailureInfo {
            exception_types: vec![Some("Outer".into()), Some("Inner".into())],
            messages: vec!["m1".into(), "m2".into()],
            stack_traces: vec![None, Some("at inner()".into())],
            parent_indices: vec![FailureInfo::NO_PARENT, 0],
        };
        assert_eq!(failure.combined_stack_trace(), "at inner()");
    }

    #[test]
    fn test_source_location_empty_checks() {
        assert!(SourceLocation::default().is_empty());
        assert!(SourceLocation {
            file: Some("  ".into()),
            line: None
        }
        .is_empty());
        assert!(!SourceLocation {
            file: Some("lib.rs".into()),
            line: None
        }
        .is_empty());
        assert!(!SourceLocation {
            file: None,
            line: Some(42)
        }
        .is_empty());
    }
}
