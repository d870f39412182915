#![deny(missing_docs)]
//! Supervisor orchestration: one research session from question to report.
//!
//! The supervisor runs the clarify (optional) and brief phases, then loops:
//! reflect, collect the turn's `delegate_research` calls into a batch, fan
//! the batch out to workers bounded by `max_concurrent_units`, and append
//! findings to its transcript in task-submission order — never completion
//! order — so a session is deterministic given the same model outputs.
//! The loop ends when the model calls `research_complete`, the iteration
//! cap is reached, or the tool budget is spent; all three end in a report.

use std::sync::Arc;

use serde::Deserialize;
use sonde_model::{CallParams, ChatBackend, HttpBackend, ModelAdapter, RetryPolicy};
use sonde_report::Synthesizer;
use sonde_search::{SearchProvider, SearchTool, SearxClient};
use sonde_tool::builtin::{
    builtin_aliases, delegate_research_schema, research_complete_schema,
};
use sonde_tool::{ReflectTool, ToolRegistry};
use sonde_types::{
    CancellationToken, FinalReport, Message, ResearchBrief, RunError, RunMetadata, TaskId,
    Termination, TokenUsage, ToolCall, WorkerFindings, WorkerTask,
};
use sonde_worker::{ResearchWorker, WorkerSettings};
use tokio::sync::Semaphore;

mod config;
mod prompt;

pub use config::OrchestratorConfig;

/// What a finished run hands back.
#[derive(Debug)]
pub enum RunOutcome {
    /// The session produced a report.
    Report(FinalReport),
    /// Clarification is required before research can start; ask the user
    /// this question and run again with their answer appended.
    NeedsClarification(String),
}

#[derive(Debug, Deserialize)]
struct ClarifyDecision {
    need_clarification: bool,
    #[serde(default)]
    question: Option<String>,
}

/// Supervisor-owned mutable state. Workers never see this; they
/// communicate back only through their returned findings.
struct SupervisorState {
    tool_calls_total: u32,
    iterations: u32,
    tasks_dispatched: u32,
    findings: Vec<WorkerFindings>,
    usage: TokenUsage,
}

/// A whole research session, configured once and reusable across runs.
pub struct Orchestrator<B: ChatBackend> {
    config: OrchestratorConfig,
    supervisor: Arc<ModelAdapter<B>>,
    worker: Arc<ResearchWorker<B>>,
    synthesizer: Synthesizer<B>,
    supervisor_tools: ToolRegistry,
}

impl Orchestrator<HttpBackend> {
    /// Wire a session over HTTP backends and the configured search
    /// endpoint. One HTTP client is shared by every transport.
    pub fn new(config: OrchestratorConfig) -> Self {
        let config = config.clamped();
        let http = reqwest::Client::new();
        let retry = RetryPolicy {
            max_transport_retries: config.max_transport_retries,
            ..RetryPolicy::default()
        };
        let adapter_for = |backend: &sonde_model::Backend| {
            Arc::new(
                ModelAdapter::new(backend.clone(), HttpBackend::with_client(backend, http.clone()))
                    .with_retry_policy(retry.clone())
                    .with_structured_attempts(config.max_structured_retries)
                    .with_aliases(builtin_aliases()),
            )
        };

        let summarizer = adapter_for(&config.summarization_backend);
        let search_provider = Arc::new(
            SearchProvider::new(
                SearxClient::with_client(&config.search_endpoint, http.clone()),
                summarizer,
            )
            .max_content_length(config.max_content_length),
        );
        let mut worker_tools = ToolRegistry::new();
        worker_tools.register(Arc::new(SearchTool::new(
            search_provider,
            config.max_results_per_query,
        )));
        worker_tools.register(Arc::new(ReflectTool));

        Self::with_parts(
            config.clone(),
            adapter_for(&config.supervisor_backend),
            adapter_for(&config.worker_backend),
            adapter_for(&config.final_report_backend),
            Arc::new(worker_tools),
        )
    }
}

impl<B: ChatBackend + 'static> Orchestrator<B> {
    /// Assemble a session from pre-built adapters and a worker tool
    /// registry. This is the seam deterministic tests use.
    pub fn with_parts(
        config: OrchestratorConfig,
        supervisor: Arc<ModelAdapter<B>>,
        worker_adapter: Arc<ModelAdapter<B>>,
        report_adapter: Arc<ModelAdapter<B>>,
        worker_tools: Arc<ToolRegistry>,
    ) -> Self {
        let config = config.clamped();

        let worker = Arc::new(
            ResearchWorker::new(worker_adapter, worker_tools).with_settings(WorkerSettings {
                response_language: config.response_language.clone(),
                ..WorkerSettings::default()
            }),
        );
        let synthesizer =
            Synthesizer::new(report_adapter).response_language(config.response_language.clone());

        let mut supervisor_tools = ToolRegistry::new();
        supervisor_tools.register(Arc::new(ReflectTool));
        supervisor_tools.declare(delegate_research_schema());
        supervisor_tools.declare(research_complete_schema());

        Self {
            config,
            supervisor,
            worker,
            synthesizer,
            supervisor_tools,
        }
    }

    /// Convenience wrapper around [`Orchestrator::run`] for a bare
    /// question.
    pub async fn run_question(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        self.run(&[Message::user(question)], cancel).await
    }

    /// Run one session over the user's messages.
    ///
    /// Returns a report, a clarification request, or exactly one
    /// top-level error. Intermediate tool failures never reach here — they
    /// are absorbed as observations and degraded findings.
    pub async fn run(
        &self,
        user_messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let mut state = SupervisorState {
            tool_calls_total: 0,
            iterations: 0,
            tasks_dispatched: 0,
            findings: Vec::new(),
            usage: TokenUsage::default(),
        };
        let language = self.config.response_language.as_deref();

        if self.config.allow_clarification {
            if let Some(question) = self.clarify(user_messages, &mut state).await? {
                return Ok(RunOutcome::NeedsClarification(question));
            }
        }

        let brief = self.brief(user_messages, &mut state).await?;
        tracing::info!(question = %brief.question, "research brief established");

        let mut transcript = vec![
            Message::system(prompt::supervisor_system(&brief, language)),
            Message::user("Plan the research and delegate the first sub-questions.".to_string()),
        ];

        let mut termination = None;
        while state.iterations < self.config.max_supervisor_iterations {
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            state.iterations += 1;

            let call_params = CallParams::default();
            let turn = tokio::select! {
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                turn = self.supervisor.complete_with_tools(
                    &mut transcript,
                    self.supervisor_tools.schemas(),
                    &call_params,
                ) => turn?,
            };
            state.usage.add(turn.usage);

            let (batch, complete_signal, budget_hit) =
                self.interpret_turn(&turn.tool_calls, &mut state, &mut transcript).await;

            if !batch.is_empty() {
                let findings = self.fan_out(&brief, batch, &cancel).await?;
                for finding in findings {
                    state.usage.add(finding.usage);
                    transcript.push(Message::observation(
                        self.supervisor
                            .format_observation(&render_findings(&finding)),
                    ));
                    state.findings.push(finding);
                }
            }

            if complete_signal {
                termination = Some(Termination::DoneByModel);
                break;
            }
            if budget_hit || state.tool_calls_total >= self.config.max_total_tool_calls {
                termination = Some(Termination::DoneByToolBudget);
                break;
            }
        }
        let termination = termination.unwrap_or(Termination::DoneByIterations);

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        tracing::info!(
            ?termination,
            iterations = state.iterations,
            tasks = state.tasks_dispatched,
            "research loop finished, synthesizing"
        );

        let metadata = RunMetadata {
            termination,
            supervisor_iterations: state.iterations,
            tasks_dispatched: state.tasks_dispatched,
            usage: state.usage,
        };
        let report = self
            .synthesizer
            .synthesize(&brief, &state.findings, metadata)
            .await?;
        Ok(RunOutcome::Report(report))
    }

    async fn clarify(
        &self,
        user_messages: &[Message],
        state: &mut SupervisorState,
    ) -> Result<Option<String>, RunError> {
        let messages = [
            Message::system(prompt::clarify_system()),
            Message::user(prompt::render_user_messages(user_messages)),
        ];
        let (decision, usage) = self
            .supervisor
            .structured::<ClarifyDecision>(&messages, &prompt::clarify_schema(), &CallParams::default())
            .await?;
        state.usage.add(usage);
        if decision.need_clarification {
            let question = decision.question.unwrap_or_else(|| {
                "Could you say more about what exactly you want to find out?".to_string()
            });
            return Ok(Some(question));
        }
        Ok(None)
    }

    async fn brief(
        &self,
        user_messages: &[Message],
        state: &mut SupervisorState,
    ) -> Result<ResearchBrief, RunError> {
        let messages = [
            Message::system(prompt::brief_system(self.config.response_language.as_deref())),
            Message::user(prompt::render_user_messages(user_messages)),
        ];
        let (brief, usage) = self
            .supervisor
            .structured::<ResearchBrief>(&messages, &ResearchBrief::schema(), &CallParams::default())
            .await?;
        state.usage.add(usage);
        Ok(brief)
    }

    /// Walk one turn's tool calls: count them against the budget, collect
    /// delegations, note the completion signal, and answer everything else
    /// through the supervisor registry.
    async fn interpret_turn(
        &self,
        tool_calls: &[ToolCall],
        state: &mut SupervisorState,
        transcript: &mut Vec<Message>,
    ) -> (Vec<WorkerTask>, bool, bool) {
        let mut batch = Vec::new();
        let mut complete_signal = false;
        let mut budget_hit = false;

        for call in tool_calls {
            if state.tool_calls_total >= self.config.max_total_tool_calls {
                budget_hit = true;
                break;
            }
            state.tool_calls_total += 1;

            let payload = match call.name.as_str() {
                "delegate_research" => match self.delegate(call, state) {
                    Ok(task) => {
                        let ack = format!("Delegated to {}: {}", task.id, task.sub_question);
                        batch.push(task);
                        ack
                    }
                    Err(message) => message,
                },
                "research_complete" => {
                    complete_signal = true;
                    "Research marked complete.".to_string()
                }
                _ => self.supervisor_tools.dispatch(call).await.payload,
            };
            transcript.push(self.supervisor.observation_message(&call.id, &payload));
        }

        (batch, complete_signal, budget_hit)
    }

    fn delegate(&self, call: &ToolCall, state: &mut SupervisorState) -> Result<WorkerTask, String> {
        let Some(sub_question) = call
            .arguments
            .get("sub_question")
            .and_then(|q| q.as_str())
            .filter(|q| !q.trim().is_empty())
        else {
            return Err("invalid input: missing required parameter: sub_question".to_string());
        };
        state.tasks_dispatched += 1;
        Ok(WorkerTask {
            id: TaskId::new(format!("task-{}", state.tasks_dispatched)),
            sub_question: sub_question.trim().to_string(),
            rationale: call
                .arguments
                .get("rationale")
                .and_then(|r| r.as_str())
                .map(str::to_string),
            max_iterations: self.config.max_worker_iterations,
            max_tool_calls: self.config.max_worker_tool_calls,
        })
    }

    /// Run a batch of worker tasks concurrently under the unit bound and
    /// return findings in submission order regardless of completion order.
    async fn fan_out(
        &self,
        brief: &ResearchBrief,
        tasks: Vec<WorkerTask>,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkerFindings>, RunError> {
        tracing::debug!(batch = tasks.len(), "fanning out research units");
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_units));
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let worker = Arc::clone(&self.worker);
            let brief = brief.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.child_token();
            handles.push((
                task.id.clone(),
                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return WorkerFindings::failed(task.id.clone(), "cancelled"),
                    };
                    worker.run(&task, &brief, &cancel).await
                }),
            ));
        }

        let mut findings = Vec::with_capacity(handles.len());
        for (task_id, handle) in handles {
            match handle.await {
                Ok(finding) => findings.push(finding),
                Err(e) => findings.push(WorkerFindings::failed(
                    task_id,
                    format!("worker task panicked: {e}"),
                )),
            }
        }

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        Ok(findings)
    }
}

/// Render one worker's findings as a supervisor observation.
fn render_findings(finding: &WorkerFindings) -> String {
    let mut out = format!(
        "Findings from {id} ({status:?}):\n",
        id = finding.task_id,
        status = finding.status,
    );
    if let Some(error) = &finding.error {
        out.push_str(&format!("(failed: {error})\n"));
    }
    if finding.compressed_text.is_empty() {
        out.push_str("(no supported claims)\n");
    } else {
        out.push_str(&finding.compressed_text);
    }
    out
}
