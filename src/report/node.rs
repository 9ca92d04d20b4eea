//! In-memory report tree.
//!
//! One node per nesting level the serialized document knows about: assembly,
//! collection, test. Class and method are attributes of a test node, not
//! separate containers. `passed` is never stored anywhere in the tree; it is
//! derived from total/failed/skipped at serialization.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::events::{FailureInfo, ScopeTotals, SourceLocation};

/// Outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestResult {
    Pass,
    Fail,
    Skip,
}

impl TestResult {
    pub fn label(self) -> &'static str {
        match self {
            TestResult::Pass => "Pass",
            TestResult::Fail => "Fail",
            TestResult::Skip => "Skip",
        }
    }
}

/// One closed test under a collection.
pub(crate) struct TestNode {
    pub display_name: Arc<str>,
    pub type_name: Option<Arc<str>>,
    pub method_name: Option<Arc<str>>,
    pub result: TestResult,
    pub time: f64,
    pub output: Arc<str>,
    pub source: Option<SourceLocation>,
    pub traits: BTreeMap<String, Vec<String>>,
    pub failure: Option<FailureInfo>,
    pub reason: Option<Arc<str>>,
}

/// One collection under the assembly.
///
/// Opened by a collection-start event, or lazily by the first test event
/// naming an unknown collection id. Totals are copied from the authoritative
/// finish event, never recomputed from children.
pub(crate) struct CollectionNode {
    pub display_name: Option<Arc<str>>,
    pub totals: Option<ScopeTotals>,
    pub tests: Vec<TestNode>,
}

impl CollectionNode {
    pub fn new() -> Self {
        Self {
            display_name: None,
            totals: None,
            tests: Vec::new(),
        }
    }

    /// Collections with zero discovered tests stay out of the document.
    pub fn is_serialized(&self) -> bool {
        !self.tests.is_empty() || self.totals.map_or(false, |t| t.total > 0)
    }
}

/// Assembly-level metadata captured from the assembly-start event.
#[derive(Default)]
pub(crate) struct AssemblyMeta {
    pub name: Option<Arc<str>>,
    pub config_file: Option<Arc<str>>,
    pub start_time: Option<DateTime<Utc>>,
    pub target_framework: Option<Arc<str>>,
    pub environment: Option<Arc<str>>,
    pub test_framework: Option<Arc<str>>,
}

/// One entry of the document's errors section.
pub(crate) struct ErrorEntry {
    /// Stable category string (`fatal`, `assembly-cleanup`, ...).
    pub category: &'static str,
    /// Human-readable scope name, looked up from the matching start event.
    pub name: Option<Arc<str>>,
    pub failure: FailureInfo,
}
