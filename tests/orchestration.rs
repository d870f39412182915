//! End-to-end orchestration scenarios with deterministic scripted
//! backends: happy path, parallel fan-out, ReAct recovery, structured
//! failure, budget exhaustion, and cancellation.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sonde_model::{Backend, ChatBackend, ChatReply, ChatRequest, ModelAdapter};
use sonde_supervisor::{Orchestrator, OrchestratorConfig, RunOutcome};
use sonde_tool::{ReflectTool, ToolDyn, ToolRegistry};
use sonde_types::{
    CancellationToken, Message, ModelError, RunError, Termination, TokenUsage, ToolCall, ToolError,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tracks concurrent in-flight calls and the high-water mark.
#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }
    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
    fn high_water(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

struct ScriptedReply {
    reply: Result<ChatReply, ModelError>,
    delay: Duration,
}

fn text(content: &str) -> ScriptedReply {
    ScriptedReply {
        reply: Ok(ChatReply {
            text: content.to_string(),
            tool_calls: Vec::new(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }),
        delay: Duration::ZERO,
    }
}

fn tools(calls: Vec<(&str, &str, serde_json::Value)>) -> ScriptedReply {
    ScriptedReply {
        reply: Ok(ChatReply {
            text: String::new(),
            tool_calls: calls
                .into_iter()
                .map(|(id, name, arguments)| ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments,
                })
                .collect(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }),
        delay: Duration::ZERO,
    }
}

fn delayed(mut reply: ScriptedReply, millis: u64) -> ScriptedReply {
    reply.delay = Duration::from_millis(millis);
    reply
}

struct Route {
    needle: String,
    queue: Mutex<VecDeque<ScriptedReply>>,
}

/// Backend serving scripted replies, optionally routed by a substring of
/// the request's messages so concurrent workers each get their own script.
struct StubBackend {
    routes: Vec<Route>,
    fallback: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    gauge: Option<Arc<Gauge>>,
}

impl StubBackend {
    fn queued(replies: Vec<ScriptedReply>) -> Arc<Self> {
        Arc::new(Self {
            routes: Vec::new(),
            fallback: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gauge: None,
        })
    }

    fn routed(routes: Vec<(&str, Vec<ScriptedReply>)>, gauge: Option<Arc<Gauge>>) -> Arc<Self> {
        Arc::new(Self {
            routes: routes
                .into_iter()
                .map(|(needle, replies)| Route {
                    needle: needle.to_string(),
                    queue: Mutex::new(replies.into()),
                })
                .collect(),
            fallback: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gauge,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn pop(&self, request: &ChatRequest) -> ScriptedReply {
        for route in &self.routes {
            if request
                .messages
                .iter()
                .any(|m| m.content.contains(&route.needle))
            {
                return route
                    .queue
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| panic!("route '{}' exhausted", route.needle));
            }
        }
        self.fallback
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted backend exhausted")
    }
}

impl ChatBackend for StubBackend {
    fn chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, ModelError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.pop(&request);
        self.requests.lock().unwrap().push(request);
        let gauge = self.gauge.clone();
        async move {
            if let Some(gauge) = &gauge {
                gauge.enter();
            }
            if !scripted.delay.is_zero() {
                tokio::time::sleep(scripted.delay).await;
            }
            if let Some(gauge) = &gauge {
                gauge.exit();
            }
            scripted.reply
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Canned search tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct CannedSearchTool {
    invocations: AtomicUsize,
}

impl CannedSearchTool {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            invocations: AtomicUsize::new(0),
        })
    }
}

impl ToolDyn for CannedSearchTool {
    fn name(&self) -> &str {
        "search"
    }
    fn description(&self) -> &str {
        "canned search"
    }
    fn parameters(&self) -> serde_json::Value {
        sonde_tool::builtin::search_schema().parameters
    }
    fn call(
        &self,
        _arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {
            Ok(serde_json::json!({
                "results": [{
                    "url": "https://example.org/hnsw",
                    "title": "HNSW paper",
                    "summary": "a navigable small-world graph index",
                    "key_excerpts": [],
                }],
                "failures": [],
                "usage": {"input_tokens": 1, "output_tokens": 1},
            }))
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn native(model: &str) -> Backend {
    Backend::new(model, "http://unused/v1")
}

fn prompt_driven(model: &str) -> Backend {
    Backend::new(model, "http://unused/v1")
        .native_structured(false)
        .native_tools(false)
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig::single_backend(native("stub"), "http://unused:8888")
}

fn orchestrator(
    config: OrchestratorConfig,
    supervisor_backend: Arc<StubBackend>,
    worker_backend: Arc<StubBackend>,
    worker_descriptor: Backend,
    report_backend: Arc<StubBackend>,
    search: Arc<CannedSearchTool>,
) -> Orchestrator<Arc<StubBackend>> {
    let mut worker_tools = ToolRegistry::new();
    worker_tools.register(Arc::new(search));
    worker_tools.register(Arc::new(ReflectTool));
    Orchestrator::with_parts(
        config,
        Arc::new(ModelAdapter::new(native("supervisor"), supervisor_backend)),
        Arc::new(ModelAdapter::new(worker_descriptor, worker_backend)),
        Arc::new(ModelAdapter::new(native("report"), report_backend)),
        Arc::new(worker_tools),
    )
}

fn brief_reply() -> ScriptedReply {
    text("{\"question\": \"what is HNSW?\", \"success_criteria\": [], \"constraints\": [], \"language\": \"en\"}")
}

fn delegate(id: &str, sub_question: &str) -> (&'static str, &'static str, serde_json::Value) {
    // Leak the id so the tuple helpers stay simple; tests only.
    (
        Box::leak(id.to_string().into_boxed_str()),
        "delegate_research",
        serde_json::json!({"sub_question": sub_question}),
    )
}

fn compression_reply() -> ScriptedReply {
    text(
        "{\"claims\": [{\"text\": \"HNSW is a navigable small-world graph index\", \
         \"source_indices\": [1]}], \"sources\": [{\"url\": \"https://example.org/hnsw\", \
         \"title\": \"HNSW paper\"}]}",
    )
}

fn report_reply() -> ScriptedReply {
    text(
        "{\"markdown\": \"# HNSW\\n\\nHNSW is a navigable small-world graph index [1].\\n\\n## \
         Sources\\n[1] HNSW paper — https://example.org/hnsw\\n\"}",
    )
}

fn expect_report(outcome: RunOutcome) -> sonde_types::FinalReport {
    match outcome {
        RunOutcome::Report(report) => report,
        RunOutcome::NeedsClarification(question) => {
            panic!("expected a report, got clarification: {question}")
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scenario: single-query happy path.
#[tokio::test]
async fn single_query_happy_path() {
    let supervisor = StubBackend::queued(vec![
        brief_reply(),
        tools(vec![delegate("call-1", "what is HNSW exactly?")]),
        tools(vec![("call-2", "research_complete", serde_json::json!({}))]),
    ]);
    let worker = StubBackend::queued(vec![
        tools(vec![(
            "call-w1",
            "search",
            serde_json::json!({"queries": ["hnsw"]}),
        )]),
        text("I have enough."),
        compression_reply(),
    ]);
    let report = StubBackend::queued(vec![report_reply()]);
    let search = CannedSearchTool::new();

    let session = orchestrator(
        config(),
        supervisor,
        worker,
        native("worker"),
        report,
        Arc::clone(&search),
    );
    let outcome = session
        .run_question("What is HNSW?", CancellationToken::new())
        .await
        .unwrap();
    let report = expect_report(outcome);

    assert!(report.markdown.contains("[1]"));
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].url, "https://example.org/hnsw");
    assert_eq!(report.metadata.termination, Termination::DoneByModel);
    assert!(!report.metadata.termination.truncated());
    assert_eq!(report.metadata.tasks_dispatched, 1);
    assert_eq!(search.invocations.load(Ordering::SeqCst), 1);
}

/// Scenario: parallel fan-out under `max_concurrent_units = 2` with
/// reversed latencies still appends findings in submission order.
#[tokio::test]
async fn fan_out_bounds_concurrency_and_keeps_submission_order() {
    let supervisor = StubBackend::queued(vec![
        brief_reply(),
        tools(vec![
            delegate("call-1", "angle-alpha"),
            delegate("call-2", "angle-beta"),
            delegate("call-3", "angle-gamma"),
        ]),
        tools(vec![("call-4", "research_complete", serde_json::json!({}))]),
    ]);
    let gauge = Arc::new(Gauge::default());
    // First-submitted worker is slowest; last is fastest.
    let worker = StubBackend::routed(
        vec![
            ("angle-alpha", vec![delayed(text("alpha done"), 80)]),
            ("angle-beta", vec![delayed(text("beta done"), 40)]),
            ("angle-gamma", vec![delayed(text("gamma done"), 5)]),
        ],
        Some(Arc::clone(&gauge)),
    );
    let report = StubBackend::queued(vec![report_reply()]);

    let mut config = config();
    config.max_concurrent_units = 2;
    let session = orchestrator(
        config,
        supervisor,
        worker,
        native("worker"),
        Arc::clone(&report),
        CannedSearchTool::new(),
    );
    let outcome = session
        .run_question("What is HNSW?", CancellationToken::new())
        .await
        .unwrap();
    expect_report(outcome);

    assert!(gauge.high_water() <= 2, "saw {} concurrent workers", gauge.high_water());

    // The synthesis context lists findings in submission order.
    let requests = report.requests.lock().unwrap();
    let context = &requests[0].messages[1].content;
    let p1 = context.find("task-1").unwrap();
    let p2 = context.find("task-2").unwrap();
    let p3 = context.find("task-3").unwrap();
    assert!(p1 < p2 && p2 < p3);
}

/// Serialized execution (`max_concurrent_units = 1`) produces the same
/// synthesis input as the parallel run.
#[tokio::test]
async fn serialized_run_matches_parallel_run() {
    let mut contexts = Vec::new();
    for units in [1usize, 2] {
        let supervisor = StubBackend::queued(vec![
            brief_reply(),
            tools(vec![
                delegate("call-1", "angle-alpha"),
                delegate("call-2", "angle-beta"),
            ]),
            tools(vec![("call-3", "research_complete", serde_json::json!({}))]),
        ]);
        let worker = StubBackend::routed(
            vec![
                ("angle-alpha", vec![delayed(text("alpha done"), 30)]),
                ("angle-beta", vec![delayed(text("beta done"), 5)]),
            ],
            None,
        );
        let report = StubBackend::queued(vec![report_reply()]);
        let mut config = config();
        config.max_concurrent_units = units;
        let session = orchestrator(
            config,
            supervisor,
            worker,
            native("worker"),
            Arc::clone(&report),
            CannedSearchTool::new(),
        );
        let outcome = session
            .run_question("What is HNSW?", CancellationToken::new())
            .await
            .unwrap();
        expect_report(outcome);
        let requests = report.requests.lock().unwrap();
        contexts.push(requests[0].messages[1].content.clone());
    }
    assert_eq!(contexts[0], contexts[1]);
}

/// Scenario: a ReAct worker recovers from one malformed reply and the
/// session completes normally.
#[tokio::test]
async fn react_worker_recovers_from_malformed_reply() {
    let supervisor = StubBackend::queued(vec![
        brief_reply(),
        tools(vec![delegate("call-1", "how does HNSW search work?")]),
        tools(vec![("call-2", "research_complete", serde_json::json!({}))]),
    ]);
    let worker = StubBackend::queued(vec![
        text("let me think about searching for this"),
        text("Thought: search it\nAction: search\nAction Input: {\"queries\": [\"hnsw\"]}"),
        text("Thought: enough\nFinal Answer: covered."),
        compression_reply(),
    ]);
    let report = StubBackend::queued(vec![report_reply()]);
    let search = CannedSearchTool::new();

    let session = orchestrator(
        config(),
        supervisor,
        Arc::clone(&worker),
        prompt_driven("local-worker"),
        report,
        Arc::clone(&search),
    );
    let outcome = session
        .run_question("What is HNSW?", CancellationToken::new())
        .await
        .unwrap();
    let report = expect_report(outcome);

    // The malformed reply was nudged once, then the tool call dispatched.
    assert_eq!(search.invocations.load(Ordering::SeqCst), 1);
    assert_eq!(report.metadata.termination, Termination::DoneByModel);
    // Exactly one parse nudge crossed the wire.
    let requests = worker.requests.lock().unwrap();
    let nudges = requests
        .iter()
        .flat_map(|r| r.messages.iter())
        .filter(|m| m.content.contains("not parseable"))
        .count();
    assert!(nudges >= 1);
}

/// Scenario: the brief never validates; the orchestration surfaces a
/// structured-output error and no workers are spawned.
#[tokio::test]
async fn structured_failure_surfaces_and_spawns_nothing() {
    let supervisor = StubBackend::queued(vec![
        text("not json"),
        text("still not json"),
        text("never json"),
    ]);
    let worker = StubBackend::queued(vec![]);
    let report = StubBackend::queued(vec![]);

    let session = orchestrator(
        config(),
        supervisor,
        Arc::clone(&worker),
        native("worker"),
        Arc::clone(&report),
        CannedSearchTool::new(),
    );
    let err = session
        .run_question("What is HNSW?", CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        RunError::Model(ModelError::StructuredOutput { attempts, .. }) => {
            assert_eq!(attempts, 3)
        }
        other => panic!("expected StructuredOutput, got {other:?}"),
    }
    assert_eq!(worker.call_count(), 0);
    assert_eq!(report.call_count(), 0);
}

/// Scenario: the tool budget ends the session after exactly two workers;
/// the report is still produced and flagged truncated.
#[tokio::test]
async fn tool_budget_exhaustion_truncates_but_reports() {
    let supervisor = StubBackend::queued(vec![
        brief_reply(),
        tools(vec![delegate("call-1", "angle-one")]),
        tools(vec![delegate("call-2", "angle-two")]),
    ]);
    let worker = StubBackend::routed(
        vec![
            ("angle-one", vec![text("one done")]),
            ("angle-two", vec![text("two done")]),
        ],
        None,
    );
    let report = StubBackend::queued(vec![report_reply()]);

    let mut config = config();
    config.max_total_tool_calls = 2;
    let session = orchestrator(
        config,
        supervisor,
        worker,
        native("worker"),
        report,
        CannedSearchTool::new(),
    );
    let outcome = session
        .run_question("What is HNSW?", CancellationToken::new())
        .await
        .unwrap();
    let report = expect_report(outcome);

    assert_eq!(report.metadata.termination, Termination::DoneByToolBudget);
    assert!(report.metadata.termination.truncated());
    assert_eq!(report.metadata.tasks_dispatched, 2);
    assert_eq!(report.metadata.supervisor_iterations, 2);
}

/// Scenario: cancellation during fan-out aborts everything and produces no
/// report.
#[tokio::test]
async fn cancellation_during_fan_out_returns_no_report() {
    let supervisor = StubBackend::queued(vec![
        brief_reply(),
        tools(vec![
            delegate("call-1", "angle-fast"),
            delegate("call-2", "angle-slow-b"),
            delegate("call-3", "angle-slow-c"),
        ]),
    ]);
    let worker = StubBackend::routed(
        vec![
            ("angle-fast", vec![delayed(text("fast done"), 5)]),
            ("angle-slow-b", vec![delayed(text("never seen"), 60_000)]),
            ("angle-slow-c", vec![delayed(text("never seen"), 60_000)]),
        ],
        None,
    );
    let report = StubBackend::queued(vec![]);

    let session = orchestrator(
        config(),
        supervisor,
        worker,
        native("worker"),
        Arc::clone(&report),
        CannedSearchTool::new(),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = session
        .run_question("What is HNSW?", cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Cancelled));
    assert_eq!(report.call_count(), 0);
}

/// Boundary: one iteration with no delegation still reports, from the
/// brief alone.
#[tokio::test]
async fn single_iteration_without_delegation_reports_from_brief() {
    let supervisor = StubBackend::queued(vec![
        brief_reply(),
        text("I see nothing to delegate."),
    ]);
    let worker = StubBackend::queued(vec![]);
    let report = StubBackend::queued(vec![text(
        "{\"markdown\": \"# HNSW\\n\\nFrom the brief alone.\"}",
    )]);

    let mut config = config();
    config.max_supervisor_iterations = 1;
    let session = orchestrator(
        config,
        supervisor,
        Arc::clone(&worker),
        native("worker"),
        report,
        CannedSearchTool::new(),
    );
    let outcome = session
        .run_question("What is HNSW?", CancellationToken::new())
        .await
        .unwrap();
    let report = expect_report(outcome);

    assert_eq!(report.metadata.termination, Termination::DoneByIterations);
    assert!(report.sources.is_empty());
    assert_eq!(worker.call_count(), 0);
}

/// Identical inputs and scripts produce byte-identical reports.
#[tokio::test]
async fn deterministic_stub_runs_are_byte_identical() {
    let mut reports = Vec::new();
    for _ in 0..2 {
        let supervisor = StubBackend::queued(vec![
            brief_reply(),
            tools(vec![delegate("call-1", "what is HNSW exactly?")]),
            tools(vec![("call-2", "research_complete", serde_json::json!({}))]),
        ]);
        let worker = StubBackend::queued(vec![
            tools(vec![(
                "call-w1",
                "search",
                serde_json::json!({"queries": ["hnsw"]}),
            )]),
            text("I have enough."),
            compression_reply(),
        ]);
        let report = StubBackend::queued(vec![report_reply()]);
        let session = orchestrator(
            config(),
            supervisor,
            worker,
            native("worker"),
            report,
            CannedSearchTool::new(),
        );
        let outcome = session
            .run_question("What is HNSW?", CancellationToken::new())
            .await
            .unwrap();
        reports.push(expect_report(outcome));
    }
    assert_eq!(reports[0].markdown, reports[1].markdown);
    assert_eq!(reports[0].sources, reports[1].sources);
}

/// Clarification, when enabled and needed, halts before any research.
#[tokio::test]
async fn clarification_halts_before_research() {
    let supervisor = StubBackend::queued(vec![text(
        "{\"need_clarification\": true, \"question\": \"Which HNSW parameter regime?\"}",
    )]);
    let worker = StubBackend::queued(vec![]);
    let report = StubBackend::queued(vec![]);

    let mut config = config();
    config.allow_clarification = true;
    let session = orchestrator(
        config,
        supervisor,
        Arc::clone(&worker),
        native("worker"),
        Arc::clone(&report),
        CannedSearchTool::new(),
    );
    let outcome = session
        .run_question("Tell me about HNSW", CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        RunOutcome::NeedsClarification(question) => {
            assert_eq!(question, "Which HNSW parameter regime?")
        }
        RunOutcome::Report(_) => panic!("expected clarification"),
    }
    assert_eq!(worker.call_count(), 0);
    assert_eq!(report.call_count(), 0);
}

/// A worker findings message is a plain observation in the supervisor
/// transcript; `Message` meta stays clean for native transports.
#[tokio::test]
async fn supervisor_transcript_contains_findings_observations() {
    let supervisor = StubBackend::queued(vec![
        brief_reply(),
        tools(vec![delegate("call-1", "angle-alpha")]),
        tools(vec![("call-2", "research_complete", serde_json::json!({}))]),
    ]);
    let worker = StubBackend::routed(vec![("angle-alpha", vec![text("done")])], None);
    let report = StubBackend::queued(vec![report_reply()]);

    let session = orchestrator(
        config(),
        Arc::clone(&supervisor),
        worker,
        native("worker"),
        report,
        CannedSearchTool::new(),
    );
    expect_report(
        session
            .run_question("What is HNSW?", CancellationToken::new())
            .await
            .unwrap(),
    );

    // The final supervisor request carries the findings observation.
    let requests = supervisor.requests.lock().unwrap();
    let last = requests.last().unwrap();
    assert!(last
        .messages
        .iter()
        .any(|m: &Message| m.content.contains("Findings from task-1")));
}
