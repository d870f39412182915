#![deny(missing_docs)]
//! Worker researcher: drives one sub-question to compressed, cited
//! findings.
//!
//! The loop is bounded three ways — task iterations, task tool calls, and
//! the backend's context window — and always returns a
//! [`WorkerFindings`] value: `complete` when the model signalled it was
//! done, `exhausted` when a cap hit first, `failed` on a terminal error or
//! cancellation. A worker owns its private conversation and never touches
//! supervisor state.

use std::sync::Arc;

use sonde_model::{CallParams, ChatBackend, ModelAdapter};
use sonde_tool::ToolRegistry;
use sonde_types::{
    CancellationToken, Message, ModelError, ResearchBrief, Source, TokenUsage, WorkerFindings,
    WorkerStatus, WorkerTask,
};

mod compress;
mod prompt;
mod prune;

/// Knobs shared by every worker in a session.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Observations protected from pruning, counted from the end.
    pub keep_recent_observations: usize,
    /// Tokens reserved for the model's reply when budgeting the prompt.
    pub response_reserve: usize,
    /// Language every prompt asks for, when configured.
    pub response_language: Option<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            keep_recent_observations: 6,
            response_reserve: 4_096,
            response_language: None,
        }
    }
}

/// Runs worker tasks against an adapter and a tool registry.
///
/// Stateless between tasks; share one instance across a whole fan-out.
pub struct ResearchWorker<B: ChatBackend> {
    adapter: Arc<ModelAdapter<B>>,
    tools: Arc<ToolRegistry>,
    settings: WorkerSettings,
}

impl<B: ChatBackend> ResearchWorker<B> {
    /// Create a worker runner with default settings.
    pub fn new(adapter: Arc<ModelAdapter<B>>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            adapter,
            tools,
            settings: WorkerSettings::default(),
        }
    }

    /// Override the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: WorkerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Drive `task` to findings. Never returns an error — failures are
    /// encoded in the findings status.
    pub async fn run(
        &self,
        task: &WorkerTask,
        brief: &ResearchBrief,
        cancel: &CancellationToken,
    ) -> WorkerFindings {
        let language = self.settings.response_language.as_deref();
        let mut conversation = vec![
            Message::system(prompt::worker_system(brief, task, language)),
            Message::user(task.sub_question.clone()),
        ];

        let mut sources: Vec<Source> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut raw_notes: Vec<String> = Vec::new();
        let mut calls_used: u32 = 0;
        let mut status = WorkerStatus::Exhausted;

        let target = self
            .adapter
            .descriptor()
            .context_window
            .saturating_sub(self.settings.response_reserve);

        'research: for iteration in 0..task.max_iterations {
            if cancel.is_cancelled() {
                return self.cancelled(task, usage);
            }

            if !prune::prune_to_fit(
                &mut conversation,
                target,
                self.settings.keep_recent_observations,
            ) {
                tracing::debug!(task = %task.id, "context cannot be pruned to fit, exhausting");
                break 'research;
            }

            let call_params = CallParams::default();
            let turn = tokio::select! {
                _ = cancel.cancelled() => return self.cancelled(task, usage),
                turn = self.adapter.complete_with_tools(
                    &mut conversation,
                    self.tools.schemas(),
                    &call_params,
                ) => turn,
            };
            let turn = match turn {
                Ok(turn) => turn,
                Err(ModelError::ContextOverflow { .. }) => break 'research,
                Err(e) => {
                    tracing::warn!(task = %task.id, error = %e, "worker model call failed");
                    let mut findings = WorkerFindings::failed(task.id.clone(), e.to_string());
                    findings.usage = usage;
                    return findings;
                }
            };
            usage.add(turn.usage);

            if turn.finished {
                if !turn.text.is_empty() {
                    raw_notes.push(turn.text.clone());
                }
                status = WorkerStatus::Complete;
                break 'research;
            }
            if turn.tool_calls.is_empty() {
                // Parse budget spent this step; the iteration is burned.
                tracing::debug!(task = %task.id, iteration, "step produced no usable tool call");
                continue;
            }

            for call in &turn.tool_calls {
                if calls_used >= task.max_tool_calls {
                    break 'research;
                }
                calls_used += 1;

                let result = tokio::select! {
                    _ = cancel.cancelled() => return self.cancelled(task, usage),
                    result = self.tools.dispatch(call) => result,
                };

                let payload = if call.name == "search" && !result.is_error() {
                    absorb_search_payload(
                        &result.payload,
                        &mut sources,
                        &mut notes,
                        &mut usage,
                    )
                } else {
                    result.payload.clone()
                };
                conversation.push(self.adapter.observation_message(&call.id, &payload));
            }
        }

        raw_notes.extend(notes.iter().cloned());

        let compressed_text = if notes.is_empty() && sources.is_empty() {
            String::new()
        } else {
            match compress::compress(&self.adapter, task, &notes, &sources, language).await {
                Ok((text, compress_usage)) => {
                    usage.add(compress_usage);
                    text
                }
                Err(e) => {
                    tracing::warn!(task = %task.id, error = %e, "compression failed");
                    let mut findings = WorkerFindings::failed(task.id.clone(), e.to_string());
                    findings.usage = usage;
                    return findings;
                }
            }
        };

        tracing::info!(
            task = %task.id,
            ?status,
            sources = sources.len(),
            tool_calls = calls_used,
            "worker finished"
        );
        WorkerFindings {
            task_id: task.id.clone(),
            compressed_text,
            raw_notes,
            sources,
            status,
            error: None,
            usage,
        }
    }

    fn cancelled(&self, task: &WorkerTask, usage: TokenUsage) -> WorkerFindings {
        let mut findings = WorkerFindings::failed(task.id.clone(), "cancelled");
        findings.usage = usage;
        findings
    }
}

/// Fold a `search` tool payload into the worker's source ledger and notes,
/// and render the numbered observation text shown to the model.
///
/// Source numbering is stable across the whole worker: a URL seen twice
/// keeps its first index.
fn absorb_search_payload(
    payload: &str,
    sources: &mut Vec<Source>,
    notes: &mut Vec<String>,
    usage: &mut TokenUsage,
) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
        return payload.to_string();
    };

    if let Some(summarize_usage) = value.get("usage") {
        usage.add(TokenUsage {
            input_tokens: summarize_usage
                .get("input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            output_tokens: summarize_usage
                .get("output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        });
    }

    let empty = Vec::new();
    let results = value
        .get("results")
        .and_then(|r| r.as_array())
        .unwrap_or(&empty);

    let mut out = String::new();
    if results.is_empty() {
        out.push_str("No results.");
    } else {
        out.push_str("Search results:\n");
    }
    for result in results {
        let url = result.get("url").and_then(|v| v.as_str()).unwrap_or("");
        let title = result.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let summary = result
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let index = match sources.iter().position(|s| !url.is_empty() && s.url == url) {
            Some(position) => position + 1,
            None => {
                sources.push(Source {
                    url: url.to_string(),
                    title: title.to_string(),
                });
                sources.len()
            }
        };

        out.push_str(&format!("[{index}] {title} — {url}\n    {summary}\n"));
        if let Some(excerpts) = result.get("key_excerpts").and_then(|v| v.as_array()) {
            for excerpt in excerpts.iter().filter_map(|e| e.as_str()) {
                out.push_str(&format!("    \"{excerpt}\"\n"));
            }
        }
        notes.push(format!("[{index}] {title}: {summary}"));
    }

    if let Some(failures) = value.get("failures").and_then(|f| f.as_array()) {
        for failure in failures {
            let query = failure.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let message = failure
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            out.push_str(&format!("(query \"{query}\" failed: {message})\n"));
        }
    }

    out
}
