//! The model adapter: three operations, any backend.

use serde::de::DeserializeOwned;
use sonde_types::message::META_TOOL_CALLS;
use sonde_types::{estimate_messages, Message, ModelError, Role, TokenUsage, ToolCall, ToolSchema};

use crate::backend::{ChatBackend, ChatRequest};
use crate::descriptor::Backend;
use crate::normalize::{normalize_arguments, AliasTable};
use crate::retry::{with_transport_retry, RetryPolicy};
use crate::{extract, validate};

/// Per-call sampling parameters.
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Output token cap.
    pub max_tokens: Option<u32>,
}

impl CallParams {
    /// Set the temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token cap.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Result of a free-form completion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text.
    pub text: String,
    /// Token accounting, summed over transport retries.
    pub usage: TokenUsage,
}

/// Result of a structured completion.
#[derive(Debug, Clone)]
pub struct Structured {
    /// The validated document.
    pub value: serde_json::Value,
    /// Token accounting, summed over all attempts.
    pub usage: TokenUsage,
}

/// Result of one tool-calling turn.
#[derive(Debug, Clone)]
pub struct ToolTurn {
    /// Narrative text (ReAct: the thought, or the final answer).
    pub text: String,
    /// Normalized tool calls to dispatch, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Whether the model signalled completion — native: an empty tool-call
    /// list; ReAct: a `Final Answer`. An empty list with `finished ==
    /// false` means a step ended without a usable call (parse budget
    /// spent).
    pub finished: bool,
    /// Token accounting, summed over parse retries.
    pub usage: TokenUsage,
}

/// Uniform LLM surface over one backend.
///
/// Cheap to share: loops hold it in an `Arc` and call it concurrently.
pub struct ModelAdapter<B: ChatBackend> {
    descriptor: Backend,
    backend: B,
    retry: RetryPolicy,
    max_structured_attempts: u32,
    parse_retries: u32,
    aliases: AliasTable,
}

impl<B: ChatBackend> ModelAdapter<B> {
    /// Wrap a backend with default policies.
    pub fn new(descriptor: Backend, backend: B) -> Self {
        Self {
            descriptor,
            backend,
            retry: RetryPolicy::default(),
            max_structured_attempts: 3,
            parse_retries: 2,
            aliases: AliasTable::new(),
        }
    }

    /// Override the transport retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the total structured-output attempt budget (default 3).
    #[must_use]
    pub fn with_structured_attempts(mut self, attempts: u32) -> Self {
        self.max_structured_attempts = attempts.max(1);
        self
    }

    /// Override the per-step ReAct parse-retry budget (default 2).
    #[must_use]
    pub fn with_parse_retries(mut self, retries: u32) -> Self {
        self.parse_retries = retries;
        self
    }

    /// Install the tool argument alias table.
    #[must_use]
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// The backend descriptor this adapter drives.
    pub fn descriptor(&self) -> &Backend {
        &self.descriptor
    }

    /// Format a tool result payload the way this backend's transcripts
    /// expect: bare for native tool calling, `Observation:`-prefixed for
    /// ReAct.
    pub fn format_observation(&self, payload: &str) -> String {
        if self.descriptor.native_tools {
            payload.to_string()
        } else {
            sonde_react::observation(payload)
        }
    }

    /// Build the observation message answering `call_id`.
    ///
    /// Native transcripts keep the call id so the wire can emit a proper
    /// tool-result message; ReAct transcripts have no native call to
    /// answer, so the id is dropped and the payload gets the
    /// `Observation:` prefix instead.
    pub fn observation_message(&self, call_id: &str, payload: &str) -> Message {
        if self.descriptor.native_tools {
            Message::observation_for(call_id, payload)
        } else {
            Message::observation(sonde_react::observation(payload))
        }
    }

    fn guard_context(&self, messages: &[Message]) -> Result<(), ModelError> {
        let prompt_tokens = estimate_messages(messages);
        if prompt_tokens > self.descriptor.context_window {
            return Err(ModelError::ContextOverflow {
                prompt_tokens,
                limit: self.descriptor.context_window,
            });
        }
        Ok(())
    }

    fn request(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
        response_format: Option<serde_json::Value>,
        params: &CallParams,
    ) -> ChatRequest {
        ChatRequest {
            model: self.descriptor.model.clone(),
            messages,
            tools,
            response_format,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            timeout: self.descriptor.timeout,
        }
    }

    /// Free-form generation.
    pub async fn complete(
        &self,
        messages: &[Message],
        params: &CallParams,
    ) -> Result<Completion, ModelError> {
        self.guard_context(messages)?;
        let reply = with_transport_retry(&self.retry, "completion", || {
            self.backend
                .chat(self.request(messages.to_vec(), Vec::new(), None, params))
        })
        .await?;
        Ok(Completion {
            text: reply.text,
            usage: reply.usage,
        })
    }

    /// Generation constrained to a JSON-schema-like description.
    ///
    /// Native backends receive the schema as a response format; the rest
    /// get a JSON-mode system instruction. Either way the reply is
    /// extracted, validated, and re-prompted with the validation error up
    /// to the attempt budget.
    pub async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
        params: &CallParams,
    ) -> Result<Structured, ModelError> {
        let mut attempt_messages = messages.to_vec();
        let response_format = if self.descriptor.native_structured {
            Some(serde_json::json!({
                "type": "json_schema",
                "json_schema": {"name": "response", "schema": schema},
            }))
        } else {
            attempt_messages.push(Message::system(json_mode_instruction(schema)));
            None
        };

        let mut usage = TokenUsage::default();
        let mut last_error = String::new();
        for attempt in 1..=self.max_structured_attempts {
            self.guard_context(&attempt_messages)?;
            let reply = with_transport_retry(&self.retry, "structured completion", || {
                self.backend.chat(self.request(
                    attempt_messages.clone(),
                    Vec::new(),
                    response_format.clone(),
                    params,
                ))
            })
            .await?;
            usage.add(reply.usage);

            match parse_structured(&reply.text, schema) {
                Ok(value) => return Ok(Structured { value, usage }),
                Err(error) => {
                    tracing::debug!(attempt, error = %error, "structured output rejected");
                    attempt_messages.push(Message::assistant(reply.text));
                    attempt_messages.push(Message::user(format!(
                        "The previous reply was not valid: {error}. Reply again with a single \
                         JSON document matching the schema — no prose, no fencing."
                    )));
                    last_error = error;
                }
            }
        }

        Err(ModelError::StructuredOutput {
            attempts: self.max_structured_attempts,
            last_error,
        })
    }

    /// Structured completion deserialized into a concrete type.
    pub async fn structured<T: DeserializeOwned>(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
        params: &CallParams,
    ) -> Result<(T, TokenUsage), ModelError> {
        let structured = self.complete_structured(messages, schema, params).await?;
        let value = serde_json::from_value(structured.value).map_err(|e| {
            ModelError::StructuredOutput {
                attempts: self.max_structured_attempts,
                last_error: format!("validated document did not deserialize: {e}"),
            }
        })?;
        Ok((value, structured.usage))
    }

    /// One tool-calling turn against `conversation`.
    ///
    /// Appends to `conversation` exactly the messages that must persist in
    /// the transcript: the assistant reply (with native calls in its meta)
    /// and, in ReAct mode, any parse-nudge observations. Arguments of every
    /// returned call are alias-normalized.
    pub async fn complete_with_tools(
        &self,
        conversation: &mut Vec<Message>,
        tools: &[ToolSchema],
        params: &CallParams,
    ) -> Result<ToolTurn, ModelError> {
        if self.descriptor.native_tools {
            self.native_tool_turn(conversation, tools, params).await
        } else {
            self.react_tool_turn(conversation, tools, params).await
        }
    }

    async fn native_tool_turn(
        &self,
        conversation: &mut Vec<Message>,
        tools: &[ToolSchema],
        params: &CallParams,
    ) -> Result<ToolTurn, ModelError> {
        self.guard_context(conversation)?;
        let reply = with_transport_retry(&self.retry, "tool turn", || {
            self.backend
                .chat(self.request(conversation.clone(), tools.to_vec(), None, params))
        })
        .await?;

        let tool_calls: Vec<ToolCall> = reply
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = normalize_arguments(&self.aliases, &call.name, call.arguments);
                ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments,
                }
            })
            .collect();

        let mut assistant = Message::assistant(reply.text.clone());
        if !tool_calls.is_empty() {
            assistant = assistant.with_meta(
                META_TOOL_CALLS,
                serde_json::to_string(&tool_calls)
                    .map_err(|e| ModelError::InvalidResponse(e.to_string()))?,
            );
        }
        conversation.push(assistant);

        let finished = tool_calls.is_empty();
        Ok(ToolTurn {
            text: reply.text,
            tool_calls,
            finished,
            usage: reply.usage,
        })
    }

    async fn react_tool_turn(
        &self,
        conversation: &mut Vec<Message>,
        tools: &[ToolSchema],
        params: &CallParams,
    ) -> Result<ToolTurn, ModelError> {
        let preamble = Message::system(sonde_react::preamble(tools));
        let mut usage = TokenUsage::default();
        let mut parse_attempts = 0u32;

        loop {
            // The grammar preamble rides along at call time, right after the
            // loop's own system messages; it is not part of the transcript.
            let lead = conversation
                .iter()
                .take_while(|m| m.role == Role::System)
                .count();
            let mut view = Vec::with_capacity(conversation.len() + 1);
            view.extend_from_slice(&conversation[..lead]);
            view.push(preamble.clone());
            view.extend_from_slice(&conversation[lead..]);

            self.guard_context(&view)?;
            let reply = with_transport_retry(&self.retry, "tool turn", || {
                self.backend
                    .chat(self.request(view.clone(), Vec::new(), None, params))
            })
            .await?;
            usage.add(reply.usage);
            conversation.push(Message::assistant(reply.text.clone()));

            match sonde_react::decode(&reply.text) {
                Ok(sonde_react::ReactReply::Final { answer, .. }) => {
                    return Ok(ToolTurn {
                        text: answer,
                        tool_calls: Vec::new(),
                        finished: true,
                        usage,
                    });
                }
                Ok(sonde_react::ReactReply::Action { thought, mut call }) => {
                    call.id = format!("react-{}", conversation.len());
                    call.arguments = normalize_arguments(&self.aliases, &call.name, call.arguments);
                    return Ok(ToolTurn {
                        text: thought,
                        tool_calls: vec![call],
                        finished: false,
                        usage,
                    });
                }
                Err(error) => {
                    parse_attempts += 1;
                    tracing::debug!(attempt = parse_attempts, error = %error, "unparseable ReAct reply");
                    if parse_attempts > self.parse_retries {
                        // Step ends with no tool calls; the loop burns an
                        // iteration and carries on.
                        return Ok(ToolTurn {
                            text: reply.text,
                            tool_calls: Vec::new(),
                            finished: false,
                            usage,
                        });
                    }
                    conversation.push(Message::observation(sonde_react::observation(
                        sonde_react::PARSE_NUDGE,
                    )));
                }
            }
        }
    }
}

fn json_mode_instruction(schema: &serde_json::Value) -> String {
    format!(
        "Respond with a single JSON document conforming to this JSON schema:\n{schema}\n\
         Output only the JSON document — no prose, no markdown fencing."
    )
}

fn parse_structured(text: &str, schema: &serde_json::Value) -> Result<serde_json::Value, String> {
    let document = extract::extract_json(text).ok_or("no JSON document found in the reply")?;
    let value: serde_json::Value =
        serde_json::from_str(document).map_err(|e| format!("invalid JSON: {e}"))?;
    validate::validate(&value, schema)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatReply;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend that pops scripted replies and records every request.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<ChatReply, ModelError>>>,
        requests: Mutex<Vec<ChatRequest>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<ChatReply, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn texts(replies: &[&str]) -> Self {
            Self::new(
                replies
                    .iter()
                    .map(|t| {
                        Ok(ChatReply {
                            text: (*t).to_string(),
                            tool_calls: Vec::new(),
                            usage: TokenUsage {
                                input_tokens: 10,
                                output_tokens: 5,
                            },
                        })
                    })
                    .collect(),
            )
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> ChatRequest {
            self.requests.lock().unwrap().last().unwrap().clone()
        }
    }

    impl ChatBackend for ScriptedBackend {
        fn chat(
            &self,
            request: ChatRequest,
        ) -> impl std::future::Future<Output = Result<ChatReply, ModelError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("ScriptedBackend: no more replies queued");
            async move { reply }
        }
    }

    fn native_descriptor() -> Backend {
        Backend::new("test-native", "http://localhost/v1")
    }

    fn prompt_driven_descriptor() -> Backend {
        Backend::new("test-local", "http://localhost/v1")
            .native_structured(false)
            .native_tools(false)
    }

    fn search_tools() -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "search".into(),
            description: "Search".into(),
            parameters: json!({"type": "object", "required": ["queries"]}),
        }]
    }

    fn brief_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"question": {"type": "string"}},
            "required": ["question"]
        })
    }

    #[tokio::test]
    async fn complete_returns_text_and_usage() {
        let adapter = ModelAdapter::new(native_descriptor(), ScriptedBackend::texts(&["hello"]));
        let out = adapter
            .complete(&[Message::user("hi")], &CallParams::default())
            .await
            .unwrap();
        assert_eq!(out.text, "hello");
        assert_eq!(out.usage.output_tokens, 5);
    }

    #[tokio::test]
    async fn native_structured_passes_schema_as_response_format() {
        let backend = ScriptedBackend::texts(&["{\"question\": \"q\"}"]);
        let adapter = ModelAdapter::new(native_descriptor(), backend);
        let out = adapter
            .complete_structured(&[Message::user("hi")], &brief_schema(), &CallParams::default())
            .await
            .unwrap();
        assert_eq!(out.value["question"], "q");
        let request = adapter.backend.last_request();
        assert_eq!(request.response_format.unwrap()["type"], "json_schema");
    }

    #[tokio::test]
    async fn json_mode_appends_instruction_and_recovers_from_prose() {
        let backend = ScriptedBackend::texts(&[
            "Sure! Here is the JSON:\n```json\n{\"question\": \"what is HNSW?\"}\n```",
        ]);
        let adapter = ModelAdapter::new(prompt_driven_descriptor(), backend);
        let out = adapter
            .complete_structured(&[Message::user("hi")], &brief_schema(), &CallParams::default())
            .await
            .unwrap();
        assert_eq!(out.value["question"], "what is HNSW?");
        let request = adapter.backend.last_request();
        assert!(request.response_format.is_none());
        let instruction = &request.messages.last().unwrap().content;
        assert!(instruction.contains("single JSON document"));
    }

    #[tokio::test]
    async fn structured_retries_with_validator_feedback_then_succeeds() {
        let backend = ScriptedBackend::texts(&["not json at all", "{\"question\": \"q\"}"]);
        let adapter = ModelAdapter::new(prompt_driven_descriptor(), backend);
        let out = adapter
            .complete_structured(&[Message::user("hi")], &brief_schema(), &CallParams::default())
            .await
            .unwrap();
        assert_eq!(out.value["question"], "q");
        assert_eq!(adapter.backend.call_count(), 2);
        // The second request carries the prior reply and the feedback.
        let request = adapter.backend.last_request();
        let feedback = &request.messages[request.messages.len() - 1].content;
        assert!(feedback.contains("was not valid"));
        // Usage is summed over attempts.
        assert_eq!(out.usage.output_tokens, 10);
    }

    #[tokio::test]
    async fn structured_fails_after_attempt_budget() {
        let backend = ScriptedBackend::texts(&["nope", "still nope", "nope again"]);
        let adapter = ModelAdapter::new(prompt_driven_descriptor(), backend);
        let err = adapter
            .complete_structured(&[Message::user("hi")], &brief_schema(), &CallParams::default())
            .await
            .unwrap_err();
        match err {
            ModelError::StructuredOutput { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected StructuredOutput, got {other:?}"),
        }
        assert_eq!(adapter.backend.call_count(), 3);
    }

    #[tokio::test]
    async fn eventual_success_equals_direct_success() {
        let direct = ModelAdapter::new(
            prompt_driven_descriptor(),
            ScriptedBackend::texts(&["{\"question\": \"q\"}"]),
        );
        let retried = ModelAdapter::new(
            prompt_driven_descriptor(),
            ScriptedBackend::texts(&["garbage", "{\"question\": \"q\"}"]),
        );
        let params = CallParams::default();
        let a = direct
            .complete_structured(&[Message::user("hi")], &brief_schema(), &params)
            .await
            .unwrap();
        let b = retried
            .complete_structured(&[Message::user("hi")], &brief_schema(), &params)
            .await
            .unwrap();
        assert_eq!(a.value, b.value);
    }

    #[tokio::test]
    async fn native_tool_calls_are_normalized_and_persisted() {
        let backend = ScriptedBackend::new(vec![Ok(ChatReply {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "call-1".into(),
                name: "search".into(),
                arguments: json!({"query": ["hnsw"]}),
            }],
            usage: TokenUsage::default(),
        })]);
        let adapter = ModelAdapter::new(native_descriptor(), backend).with_aliases({
            let mut t = AliasTable::new();
            t.insert("search".into(), vec![("query".into(), "queries".into())]);
            t
        });
        let mut conversation = vec![Message::system("sys"), Message::user("go")];
        let turn = adapter
            .complete_with_tools(&mut conversation, &search_tools(), &CallParams::default())
            .await
            .unwrap();
        assert!(!turn.finished);
        assert_eq!(turn.tool_calls[0].arguments, json!({"queries": ["hnsw"]}));
        // The assistant message persists the normalized calls in its meta.
        let meta = conversation.last().unwrap().meta.get(META_TOOL_CALLS).unwrap();
        assert!(meta.contains("\"queries\""));
    }

    #[tokio::test]
    async fn native_empty_tool_list_finishes_the_turn() {
        let adapter = ModelAdapter::new(native_descriptor(), ScriptedBackend::texts(&["done"]));
        let mut conversation = vec![Message::user("go")];
        let turn = adapter
            .complete_with_tools(&mut conversation, &search_tools(), &CallParams::default())
            .await
            .unwrap();
        assert!(turn.finished);
        assert!(turn.tool_calls.is_empty());
        assert_eq!(turn.text, "done");
    }

    #[tokio::test]
    async fn react_turn_decodes_action_and_injects_preamble() {
        let backend = ScriptedBackend::texts(&[
            "Thought: search it\nAction: search\nAction Input: {\"queries\": [\"hnsw\"]}",
        ]);
        let adapter = ModelAdapter::new(prompt_driven_descriptor(), backend);
        let mut conversation = vec![Message::system("sys"), Message::user("go")];
        let turn = adapter
            .complete_with_tools(&mut conversation, &search_tools(), &CallParams::default())
            .await
            .unwrap();
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "search");
        assert!(!turn.tool_calls[0].id.is_empty());
        assert!(!turn.finished);
        // Preamble rode along after the system message but is not persisted.
        let request = adapter.backend.last_request();
        assert!(request.messages[1].content.contains("Action Input:"));
        assert_eq!(conversation.len(), 3);
        assert!(conversation[2].content.contains("Action: search"));
    }

    #[tokio::test]
    async fn react_parse_failure_nudges_once_then_dispatches() {
        let backend = ScriptedBackend::texts(&[
            "I think I should search for it",
            "Thought: ok\nAction: search\nAction Input: {\"queries\": [\"hnsw\"]}",
        ]);
        let adapter = ModelAdapter::new(prompt_driven_descriptor(), backend);
        let mut conversation = vec![Message::user("go")];
        let turn = adapter
            .complete_with_tools(&mut conversation, &search_tools(), &CallParams::default())
            .await
            .unwrap();
        assert_eq!(turn.tool_calls.len(), 1);
        let nudges: Vec<_> = conversation
            .iter()
            .filter(|m| m.content.contains(sonde_react::PARSE_NUDGE))
            .collect();
        assert_eq!(nudges.len(), 1);
        assert_eq!(nudges[0].role, Role::Observation);
    }

    #[tokio::test]
    async fn react_parse_budget_spent_ends_step_without_calls() {
        let backend = ScriptedBackend::texts(&["nonsense", "more nonsense", "still nonsense"]);
        let adapter = ModelAdapter::new(prompt_driven_descriptor(), backend);
        let mut conversation = vec![Message::user("go")];
        let turn = adapter
            .complete_with_tools(&mut conversation, &search_tools(), &CallParams::default())
            .await
            .unwrap();
        assert!(turn.tool_calls.is_empty());
        assert!(!turn.finished);
        assert_eq!(adapter.backend.call_count(), 3);
    }

    #[tokio::test]
    async fn react_final_answer_finishes() {
        let backend =
            ScriptedBackend::texts(&["Thought: enough\nFinal Answer: HNSW is a graph index."]);
        let adapter = ModelAdapter::new(prompt_driven_descriptor(), backend);
        let mut conversation = vec![Message::user("go")];
        let turn = adapter
            .complete_with_tools(&mut conversation, &search_tools(), &CallParams::default())
            .await
            .unwrap();
        assert!(turn.finished);
        assert_eq!(turn.text, "HNSW is a graph index.");
    }

    #[tokio::test]
    async fn oversized_prompt_is_context_overflow() {
        let adapter = ModelAdapter::new(
            native_descriptor().context_window(8),
            ScriptedBackend::texts(&["unreachable"]),
        );
        let err = adapter
            .complete(
                &[Message::user("a".repeat(200))],
                &CallParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::ContextOverflow { .. }));
        assert_eq!(adapter.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn transport_errors_are_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(ModelError::Network("reset".into())),
            Ok(ChatReply {
                text: "ok".into(),
                tool_calls: Vec::new(),
                usage: TokenUsage::default(),
            }),
        ]);
        let adapter = ModelAdapter::new(native_descriptor(), backend).with_retry_policy(
            RetryPolicy {
                max_transport_retries: 2,
                base_delay: std::time::Duration::from_millis(1),
            },
        );
        let out = adapter
            .complete(&[Message::user("hi")], &CallParams::default())
            .await
            .unwrap();
        assert_eq!(out.text, "ok");
        assert_eq!(adapter.backend.call_count(), 2);
    }

    #[tokio::test]
    async fn format_observation_matches_backend_mode() {
        let native = ModelAdapter::new(native_descriptor(), ScriptedBackend::texts(&[]));
        assert_eq!(native.format_observation("3 results"), "3 results");
        let react = ModelAdapter::new(prompt_driven_descriptor(), ScriptedBackend::texts(&[]));
        assert_eq!(
            react.format_observation("3 results"),
            "Observation: 3 results"
        );
    }

    #[tokio::test]
    async fn observation_messages_keep_call_ids_only_for_native_backends() {
        let native = ModelAdapter::new(native_descriptor(), ScriptedBackend::texts(&[]));
        let msg = native.observation_message("call-1", "3 results");
        assert_eq!(msg.call_id(), Some("call-1"));
        assert_eq!(msg.content, "3 results");

        let react = ModelAdapter::new(prompt_driven_descriptor(), ScriptedBackend::texts(&[]));
        let msg = react.observation_message("call-1", "3 results");
        assert_eq!(msg.call_id(), None);
        assert_eq!(msg.content, "Observation: 3 results");
    }
}
