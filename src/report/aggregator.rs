//! # ReportAggregator — build the nested run report from the event stream.
//!
//! A terminal [`Sink`] that consumes the full event stream for one run and
//! incrementally builds the assembly → collection → test tree, then
//! serializes it to the report document on demand.
//!
//! ## Rules
//! - Counters are copied from the authoritative finish events, never
//!   recomputed: collection totals come from the collection-finish event,
//!   assembly totals from the run summary on assembly-finish. `passed` is
//!   always derived as `total - failed - skipped`.
//! - `*Starting` events record scope display names by unique id; cleanup
//!   failures and run-level errors become tagged entries of the errors
//!   section, named through those recordings.
//! - Malformed sequences never fail: a finish event with no matching start
//!   is applied to whatever was last known, and a test event naming an
//!   unknown collection opens the collection node on the spot.
//! - All mutations go through one internal lock. Event producers on
//!   different threads may interleave freely; a test's events are matched to
//!   their scopes by unique id, not by arrival order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::events::{Event, FailureInfo, RunTotals, TestMeta};
use crate::report::node::{
    AssemblyMeta, CollectionNode, ErrorEntry, TestNode, TestResult,
};
use crate::report::xml::{escape_text, format_time, XmlElement};
use crate::sinks::Sink;

/// Scope display names recorded from `*Starting` events, keyed by unique id.
#[derive(Default)]
struct ScopeNames {
    assembly: Option<Arc<str>>,
    collections: HashMap<Arc<str>, Arc<str>>,
    classes: HashMap<Arc<str>, Arc<str>>,
    methods: HashMap<Arc<str>, Arc<str>>,
    cases: HashMap<Arc<str>, Arc<str>>,
    tests: HashMap<Arc<str>, Arc<str>>,
}

#[derive(Default)]
struct ReportState {
    meta: AssemblyMeta,
    totals: Option<RunTotals>,
    finished: bool,
    collections: Vec<CollectionNode>,
    collection_index: HashMap<Arc<str>, usize>,
    names: ScopeNames,
    errors: Vec<ErrorEntry>,
}

/// Terminal sink that aggregates the event stream into a run report.
#[derive(Default)]
pub struct ReportAggregator {
    state: Mutex<ReportState>,
}

impl ReportAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the assembly-finished event was observed.
    pub fn finished(&self) -> bool {
        self.lock().finished
    }

    /// Returns the run totals handed over by the assembly-finished event.
    pub fn totals(&self) -> Option<RunTotals> {
        self.lock().totals
    }

    /// Serializes the current report tree to the report document.
    ///
    /// The document is complete once [`finished`](Self::finished) reports
    /// `true`; calling earlier yields a snapshot with zeroed totals.
    pub fn xml(&self) -> String {
        self.lock().to_element().to_document()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for ReportAggregator {
    fn on_event(&self, event: &Event) -> bool {
        self.lock().apply(event);
        true
    }

    fn name(&self) -> &'static str {
        "report-aggregator"
    }
}

impl ReportState {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::AssemblyStarting {
                assembly_name,
                assembly_path,
                config_file,
                start_time,
                target_framework,
                environment,
                test_framework,
                ..
            } => {
                let display = assembly_path.clone().or_else(|| Some(assembly_name.clone()));
                self.meta.name = display.clone();
                self.meta.config_file = config_file.clone();
                self.meta.start_time = *start_time;
                self.meta.target_framework = target_framework.clone();
                self.meta.environment = environment.clone();
                self.meta.test_framework = test_framework.clone();
                self.names.assembly = display;
            }
            Event::AssemblyFinished { totals, .. } => {
                self.totals = Some(*totals);
                self.finished = true;
            }
            Event::CollectionStarting { ids, display_name } => {
                if let Some(id) = &ids.collection {
                    self.names.collections.insert(id.clone(), display_name.clone());
                    let node = self.collection_mut(Some(id.clone()));
                    node.display_name = Some(display_name.clone());
                }
            }
            Event::CollectionFinished { ids, totals } => {
                let node = self.collection_mut(ids.collection.clone());
                node.totals = Some(*totals);
            }
            Event::ClassStarting { ids, class_name } => {
                if let Some(id) = &ids.class {
                    self.names.classes.insert(id.clone(), class_name.clone());
                }
            }
            Event::MethodStarting { ids, method_name } => {
                if let Some(id) = &ids.method {
                    self.names.methods.insert(id.clone(), method_name.clone());
                }
            }
            Event::CaseStarting { ids, display_name } => {
                if let Some(id) = &ids.case {
                    self.names.cases.insert(id.clone(), display_name.clone());
                }
            }
            Event::TestStarting { ids, display_name } => {
                if let Some(id) = &ids.test {
                    self.names.tests.insert(id.clone(), display_name.clone());
                }
            }
            Event::TestPassed {
                test,
                execution_time,
                output,
            } => self.close_test(test, TestResult::Pass, *execution_time, output, None, None),
            Event::TestFailed {
                test,
                execution_time,
                output,
                failure,
            } => self.close_test(
                test,
                TestResult::Fail,
                *execution_time,
                output,
                Some(failure.clone()),
                None,
            ),
            Event::TestSkipped {
                test,
                execution_time,
                output,
                reason,
            } => self.close_test(
                test,
                TestResult::Skip,
                *execution_time,
                output,
                None,
                Some(reason.clone()),
            ),
            Event::ErrorMessage { failure } => {
                self.push_error("fatal", None, failure);
            }
            Event::AssemblyCleanupFailure { failure, .. } => {
                self.push_error("assembly-cleanup", self.names.assembly.clone(), failure);
            }
            Event::CollectionCleanupFailure { ids, failure } => {
                let name = self.scope_name(&self.names.collections, ids.collection.as_ref());
                self.push_error("test-collection-cleanup", name, failure);
            }
            Event::ClassCleanupFailure { ids, failure } => {
                let name = self.scope_name(&self.names.classes, ids.class.as_ref());
                self.push_error("test-class-cleanup", name, failure);
            }
            Event::MethodCleanupFailure { ids, failure } => {
                let name = self.scope_name(&self.names.methods, ids.method.as_ref());
                self.push_error("test-method-cleanup", name, failure);
            }
            Event::CaseCleanupFailure { ids, failure } => {
                let name = self.scope_name(&self.names.cases, ids.case.as_ref());
                self.push_error("test-case-cleanup", name, failure);
            }
            Event::TestCleanupFailure { ids, failure } => {
                let name = self.scope_name(&self.names.tests, ids.test.as_ref());
                self.push_error("test-cleanup", name, failure);
            }
            // Discovery, diagnostics, runner summaries and the remaining
            // finish events have no representation in the report tree.
            _ => {}
        }
    }

    fn scope_name(
        &self,
        names: &HashMap<Arc<str>, Arc<str>>,
        id: Option<&Arc<str>>,
    ) -> Option<Arc<str>> {
        id.and_then(|id| names.get(id).cloned())
    }

    fn push_error(&mut self, category: &'static str, name: Option<Arc<str>>, failure: &FailureInfo) {
        self.errors.push(ErrorEntry {
            category,
            name,
            failure: failure.clone(),
        });
    }

    /// Looks up the collection node for `id`, opening it if unknown. Events
    /// without a collection id share one anonymous node.
    fn collection_mut(&mut self, id: Option<Arc<str>>) -> &mut CollectionNode {
        let key = id.unwrap_or_else(|| Arc::from(""));
        let index = match self.collection_index.get(&key) {
            Some(index) => *index,
            None => {
                self.collections.push(CollectionNode::new());
                let index = self.collections.len() - 1;
                self.collection_index.insert(key, index);
                index
            }
        };
        &mut self.collections[index]
    }

    fn close_test(
        &mut self,
        test: &TestMeta,
        result: TestResult,
        time: f64,
        output: &Arc<str>,
        failure: Option<FailureInfo>,
        reason: Option<Arc<str>>,
    ) {
        let node = TestNode {
            display_name: test.display_name.clone(),
            type_name: test.class_name.clone(),
            method_name: test.method_name.clone(),
            result,
            time,
            output: output.clone(),
            source: test.source.clone(),
            traits: test.traits.clone(),
            failure,
            reason,
        };
        self.collection_mut(test.ids.collection.clone()).tests.push(node);
    }

    // --- serialization ---

    fn to_element(&self) -> XmlElement {
        let totals = self.totals.unwrap_or_default();
        let mut assembly = XmlElement::new("assembly");

        if let Some(name) = &self.meta.name {
            assembly.attr("name", escape_text(name, true));
        }
        if let Some(environment) = &self.meta.environment {
            assembly.attr("environment", escape_text(environment, true));
        }
        if let Some(test_framework) = &self.meta.test_framework {
            assembly.attr("test-framework", escape_text(test_framework, true));
        }
        if let Some(start) = &self.meta.start_time {
            assembly.attr("run-date", start.format("%Y-%m-%d").to_string());
            assembly.attr("run-time", start.format("%H:%M:%S").to_string());
        }
        if let Some(config_file) = &self.meta.config_file {
            assembly.attr("config-file", escape_text(config_file, true));
        }
        if let Some(target_framework) = &self.meta.target_framework {
            assembly.attr("target-framework", escape_text(target_framework, true));
        }
        assembly.attr("total", totals.total.to_string());
        assembly.attr("passed", totals.passed().to_string());
        assembly.attr("failed", totals.failed.to_string());
        assembly.attr("skipped", totals.skipped.to_string());
        assembly.attr("time", format_time(totals.time));
        assembly.attr("errors", totals.errors.to_string());

        let mut errors = XmlElement::new("errors");
        for entry in &self.errors {
            errors.child(error_element(entry));
        }
        assembly.child(errors);

        for collection in self.collections.iter().filter(|c| c.is_serialized()) {
            assembly.child(collection_element(collection));
        }
        assembly
    }
}

fn error_element(entry: &ErrorEntry) -> XmlElement {
    let mut error = XmlElement::new("error");
    error.attr("type", entry.category);
    if let Some(name) = &entry.name {
        error.attr("name", escape_text(name, true));
    }
    error.child(failure_element(&entry.failure));
    error
}

fn failure_element(failure: &FailureInfo) -> XmlElement {
    let mut element = XmlElement::new("failure");
    if let Some(root_type) = failure.root_type() {
        element.attr("exception-type", escape_text(root_type, true));
    }

    let mut message = XmlElement::new("message");
    let combined_message = failure.combined_message();
    if !combined_message.is_empty() {
        message.cdata(escape_text(&combined_message, true));
    }
    element.child(message);

    let mut stack_trace = XmlElement::new("stack-trace");
    let combined_trace = failure.combined_stack_trace();
    if !combined_trace.is_empty() {
        // Stack traces keep raw line breaks; other control text is escaped.
        stack_trace.cdata(escape_text(&combined_trace, false));
    }
    element.child(stack_trace);
    element
}

fn collection_element(collection: &CollectionNode) -> XmlElement {
    let mut element = XmlElement::new("collection");
    if let Some(name) = &collection.display_name {
        element.attr("name", escape_text(name, true));
    }
    if let Some(totals) = &collection.totals {
        element.attr("total", totals.total.to_string());
        element.attr("passed", totals.passed().to_string());
        element.attr("failed", totals.failed.to_string());
        element.attr("skipped", totals.skipped.to_string());
        element.attr("time", format_time(totals.time));
    }
    for test in &collection.tests {
        element.child(test_element(test));
    }
    element
}

fn test_element(test: &TestNode) -> XmlElement {
    let mut element = XmlElement::new("test");
    element.attr("name", escape_text(&test.display_name, true));
    if let Some(type_name) = &test.type_name {
        element.attr("type", escape_text(type_name, true));
    }
    if let Some(method_name) = &test.method_name {
        element.attr("method", escape_text(method_name, true));
    }
    element.attr("time", format_time(test.time));
    element.attr("result", test.result.label());

    if let Some(source) = test.source.as_ref().filter(|s| !s.is_empty()) {
        if let Some(file) = source.file.as_deref().filter(|f| !f.trim().is_empty()) {
            element.attr("source-file", escape_text(file, true));
        }
        if let Some(line) = source.line {
            element.attr("source-line", line.to_string());
        }
    }

    if !test.output.is_empty() {
        let mut output = XmlElement::new("output");
        output.cdata(escape_text(&test.output, true));
        element.child(output);
    }

    if !test.traits.is_empty() {
        let mut traits = XmlElement::new("traits");
        for (name, values) in &test.traits {
            for value in values {
                let mut pair = XmlElement::new("trait");
                pair.attr("name", escape_text(name, true));
                pair.attr("value", escape_text(value, true));
                traits.child(pair);
            }
        }
        element.child(traits);
    }

    if let Some(failure) = &test.failure {
        element.child(failure_element(failure));
    }
    if let Some(reason) = &test.reason {
        let mut reason_element = XmlElement::new("reason");
        reason_element.cdata(escape_text(reason, true));
        element.child(reason_element);
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ScopeIds, ScopeTotals, SourceLocation};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn ids() -> ScopeIds {
        ScopeIds::assembly("asm-1")
            .with_collection("asm-1::col")
            .with_class("asm-1::col::Demo")
    }

    fn meta(display_name: &str) -> TestMeta {
        TestMeta {
            ids: ids(),
            display_name: display_name.into(),
            class_name: Some("demo::Calculator".into()),
            method_name: Some("adds".into()),
            source: None,
            traits: BTreeMap::new(),
        }
    }

    fn assembly_starting() -> Event {
        Event::AssemblyStarting {
            ids: ids(),
            assembly_name: "demo".into(),
            assembly_path: Some("/tmp/demo.bin".into()),
            config_file: None,
            start_time: Some(chrono::Utc.with_ymd_and_hms(2013, 7, 6, 16, 24, 32).unwrap()),
            target_framework: None,
            environment: Some("64-bit".into()),
            test_framework: Some("testvisor 0.1".into()),
        }
    }

    fn assembly_finished(totals: RunTotals) -> Event {
        Event::AssemblyFinished { ids: ids(), totals }
    }

    #[test]
    fn test_passing_test_scenario() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&assembly_starting());
        aggregator.on_event(&Event::CollectionStarting {
            ids: ids(),
            display_name: "Demo collection".into(),
        });
        aggregator.on_event(&Event::TestPassed {
            test: meta("T"),
            execution_time: 123.4567809,
            output: "hi".into(),
        });
        aggregator.on_event(&Event::CollectionFinished {
            ids: ids(),
            totals: ScopeTotals {
                total: 1,
                failed: 0,
                skipped: 0,
                time: 123.4567809,
            },
        });
        aggregator.on_event(&assembly_finished(RunTotals {
            total: 1,
            failed: 0,
            skipped: 0,
            errors: 0,
            time: 123.4567809,
        }));

        assert!(aggregator.finished());
        let xml = aggregator.xml();
        assert!(xml.contains("<test name=\"T\""));
        assert!(xml.contains("time=\"123.457\""));
        assert!(xml.contains("<output><![CDATA[hi]]></output>"));
        assert!(!xml.contains("<failure"));
        assert!(!xml.contains("<reason"));
    }

    #[test]
    fn test_assembly_attributes_and_derived_passed() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&assembly_starting());
        aggregator.on_event(&assembly_finished(RunTotals {
            total: 2112,
            failed: 42,
            skipped: 6,
            errors: 1,
            time: 123.4567,
        }));

        let xml = aggregator.xml();
        assert!(xml.contains("name=\"/tmp/demo.bin\""));
        assert!(xml.contains("environment=\"64-bit\""));
        assert!(xml.contains("test-framework=\"testvisor 0.1\""));
        assert!(xml.contains("run-date=\"2013-07-06\""));
        assert!(xml.contains("run-time=\"16:24:32\""));
        assert!(xml.contains("total=\"2112\""));
        assert!(xml.contains("passed=\"2064\""));
        assert!(xml.contains("failed=\"42\""));
        assert!(xml.contains("skipped=\"6\""));
        assert!(xml.contains("time=\"123.457\""));
        assert!(xml.contains("errors=\"1\""));
        // Absent metadata never shows up as an empty attribute.
        assert!(!xml.contains("config-file"));
        assert!(!xml.contains("target-framework"));
    }

    #[test]
    fn test_empty_output_is_not_serialized() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::TestPassed {
            test: meta("T"),
            execution_time: 0.0,
            output: "".into(),
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        assert!(!aggregator.xml().contains("<output"));
    }

    #[test]
    fn test_failed_test_with_nested_exception() {
        let failure = FailureInfo {
            exception_types: vec![Some("OuterError".into()), Some("InnerError".into())],
            messages: vec!["outer".into(), "inner".into()],
            stack_traces: vec![Some("line 1\nline 2".into()), None],
            parent_indices: vec![FailureInfo::NO_PARENT, 0],
        };
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::TestFailed {
            test: meta("T"),
            execution_time: 0.25,
            output: "".into(),
            failure,
        });
        aggregator.on_event(&assembly_finished(RunTotals {
            total: 1,
            failed: 1,
            skipped: 0,
            errors: 0,
            time: 0.25,
        }));

        let xml = aggregator.xml();
        assert!(xml.contains("result=\"Fail\""));
        assert!(xml.contains("exception-type=\"OuterError\""));
        // Parent before child; the message text escapes its line break.
        assert!(xml.contains("<message><![CDATA[OuterError : outer\\nInnerError : inner]]></message>"));
        // Stack traces keep raw line breaks.
        assert!(xml.contains("<stack-trace><![CDATA[line 1\nline 2]]></stack-trace>"));
    }

    #[test]
    fn test_skipped_test_has_reason_element() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::TestSkipped {
            test: meta("T"),
            execution_time: 0.0,
            output: "".into(),
            reason: "not supported here".into(),
        });
        aggregator.on_event(&assembly_finished(RunTotals {
            total: 1,
            failed: 0,
            skipped: 1,
            errors: 0,
            time: 0.0,
        }));

        let xml = aggregator.xml();
        assert!(xml.contains("result=\"Skip\""));
        assert!(xml.contains("<reason><![CDATA[not supported here]]></reason>"));
        assert!(!xml.contains("<failure"));
    }

    #[test]
    fn test_source_and_traits_are_serialized_when_present() {
        let mut test = meta("T");
        test.source = Some(SourceLocation {
            file: Some("calc.rs".into()),
            line: Some(12),
        });
        test.traits
            .insert("category".to_string(), vec!["fast".to_string(), "unit".to_string()]);

        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::TestPassed {
            test,
            execution_time: 0.0,
            output: "".into(),
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        let xml = aggregator.xml();
        assert!(xml.contains("source-file=\"calc.rs\""));
        assert!(xml.contains("source-line=\"12\""));
        assert!(xml.contains("<trait name=\"category\" value=\"fast\" />"));
        assert!(xml.contains("<trait name=\"category\" value=\"unit\" />"));
    }

    #[test]
    fn test_collection_without_tests_is_omitted() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::CollectionStarting {
            ids: ids(),
            display_name: "Empty collection".into(),
        });
        aggregator.on_event(&Event::CollectionFinished {
            ids: ids(),
            totals: ScopeTotals::default(),
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        let xml = aggregator.xml();
        assert!(!xml.contains("<collection"));
        // The errors element is always present, even when empty.
        assert!(xml.contains("<errors />"));
    }

    #[test]
    fn test_unknown_collection_opened_by_test_event() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::TestPassed {
            test: meta("T"),
            execution_time: 0.0,
            output: "".into(),
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        let xml = aggregator.xml();
        assert!(xml.contains("<collection><test"));
    }

    #[test]
    fn test_collection_finish_without_start_is_tolerated() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::CollectionFinished {
            ids: ids(),
            totals: ScopeTotals {
                total: 3,
                failed: 1,
                skipped: 0,
                time: 1.5,
            },
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        // Trusted non-zero totals keep the collection in the document even
        // though no start event named it.
        let xml = aggregator.xml();
        assert!(xml.contains("<collection total=\"3\" passed=\"2\" failed=\"1\" skipped=\"0\" time=\"1.500\" />"));
    }

    #[test]
    fn test_cleanup_failures_are_tagged_and_named() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::CollectionStarting {
            ids: ids(),
            display_name: "FooBar".into(),
        });
        aggregator.on_event(&Event::CollectionCleanupFailure {
            ids: ids(),
            failure: FailureInfo::single("CleanupError", "boom", None),
        });
        aggregator.on_event(&Event::ErrorMessage {
            failure: FailureInfo::single("FatalError", "dead", None),
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        let xml = aggregator.xml();
        assert!(xml.contains("<error type=\"test-collection-cleanup\" name=\"FooBar\">"));
        assert!(xml.contains("<error type=\"fatal\"><failure"));
        assert!(xml.contains("exception-type=\"CleanupError\""));
        assert!(xml.contains("<![CDATA[FatalError : dead]]>"));
    }

    #[test]
    fn test_assembly_cleanup_failure_named_by_path() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&assembly_starting());
        aggregator.on_event(&Event::AssemblyCleanupFailure {
            ids: ids(),
            failure: FailureInfo::single("CleanupError", "boom", None),
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        assert!(aggregator
            .xml()
            .contains("<error type=\"assembly-cleanup\" name=\"/tmp/demo.bin\">"));
    }

    #[test]
    fn test_illegal_text_is_escaped_at_serialization() {
        let aggregator = ReportAggregator::new();
        aggregator.on_event(&Event::TestSkipped {
            test: meta("T\u{1}"),
            execution_time: 0.0,
            output: "".into(),
            reason: "Bad\0\r\nString".into(),
        });
        aggregator.on_event(&assembly_finished(RunTotals::default()));

        let xml = aggregator.xml();
        assert!(xml.contains("name=\"T\\x01\""));
        assert!(xml.contains("<reason><![CDATA[Bad\\0\\r\\nString]]></reason>"));
    }
}
