//! HTTP transport speaking the OpenAI-compatible chat completions wire.
//!
//! Reference: <https://platform.openai.com/docs/api-reference/chat>

use sonde_types::message::{META_CALL_ID, META_TOOL_CALLS};
use sonde_types::{Message, ModelError, Role, TokenUsage, ToolCall};

use crate::backend::{ChatBackend, ChatReply, ChatRequest};
use crate::descriptor::Backend;

/// Transport for any endpoint exposing `POST {base}/chat/completions`.
///
/// # Example
///
/// ```no_run
/// use sonde_model::{Backend, HttpBackend};
///
/// let descriptor = Backend::new("gpt-4o-mini", "https://api.openai.com/v1").api_key("sk-...");
/// let transport = HttpBackend::new(&descriptor);
/// ```
pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Build a transport for a backend descriptor with a fresh HTTP client.
    #[must_use]
    pub fn new(descriptor: &Backend) -> Self {
        Self::with_client(descriptor, reqwest::Client::new())
    }

    /// Build a transport sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(descriptor: &Backend, http: reqwest::Client) -> Self {
        Self {
            base_url: descriptor.base_url.trim_end_matches('/').to_string(),
            api_key: descriptor.api_key.clone(),
            http,
        }
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl ChatBackend for HttpBackend {
    fn chat(
        &self,
        request: ChatRequest,
    ) -> impl std::future::Future<Output = Result<ChatReply, ModelError>> + Send {
        let url = self.completions_url();
        let api_key = self.api_key.clone();
        let http = self.http.clone();

        async move {
            let timeout = request.timeout;
            let body = to_api_request(&request);
            tracing::debug!(url = %url, model = %request.model, "sending chat completion request");

            let mut builder = http.post(&url).timeout(timeout).json(&body);
            if let Some(key) = &api_key {
                builder = builder.bearer_auth(key);
            }

            let response = builder.send().await.map_err(|e| map_reqwest_error(e, timeout))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;

            if !status.is_success() {
                return Err(map_http_status(status.as_u16(), &text));
            }

            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| ModelError::InvalidResponse(format!("response is not JSON: {e}")))?;
            from_api_response(&json)
        }
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: std::time::Duration) -> ModelError {
    if error.is_timeout() {
        ModelError::Timeout(timeout)
    } else {
        ModelError::Network(error.to_string())
    }
}

fn map_http_status(status: u16, body: &str) -> ModelError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        401 | 403 => ModelError::Authentication(snippet),
        429 => ModelError::RateLimited,
        500..=599 => ModelError::ServiceUnavailable(snippet),
        _ => ModelError::InvalidResponse(format!("unexpected status {status}: {snippet}")),
    }
}

/// Map a [`ChatRequest`] to the wire JSON body.
fn to_api_request(request: &ChatRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "messages": map_messages(&request.messages),
        "stream": false,
    });

    if let Some(temperature) = request.temperature {
        body["temperature"] = serde_json::Value::from(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::Value::from(max_tokens);
    }
    if !request.tools.is_empty() {
        body["tools"] = serde_json::Value::Array(
            request
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect(),
        );
    }
    if let Some(format) = &request.response_format {
        body["response_format"] = format.clone();
    }

    body
}

/// Map transcript messages to wire messages.
///
/// Assistant messages carrying native tool calls in their meta become
/// `tool_calls` entries; observations answering a call become `tool` role
/// messages; observations without a call id (ReAct transcripts) travel as
/// `user` messages.
fn map_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    let mut wire = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::System => wire.push(serde_json::json!({
                "role": "system",
                "content": message.content,
            })),
            Role::User => wire.push(serde_json::json!({
                "role": "user",
                "content": message.content,
            })),
            Role::Assistant => {
                let mut obj = serde_json::json!({
                    "role": "assistant",
                    "content": message.content,
                });
                if let Some(raw) = message.meta.get(META_TOOL_CALLS) {
                    if let Ok(calls) = serde_json::from_str::<Vec<ToolCall>>(raw) {
                        obj["tool_calls"] = serde_json::Value::Array(
                            calls
                                .iter()
                                .map(|call| {
                                    serde_json::json!({
                                        "id": call.id,
                                        "type": "function",
                                        "function": {
                                            "name": call.name,
                                            "arguments": call.arguments.to_string(),
                                        },
                                    })
                                })
                                .collect(),
                        );
                    }
                }
                wire.push(obj);
            }
            Role::Observation => match message.meta.get(META_CALL_ID) {
                Some(call_id) => wire.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": message.content,
                })),
                None => wire.push(serde_json::json!({
                    "role": "user",
                    "content": message.content,
                })),
            },
        }
    }
    wire
}

/// Map a wire response back to a [`ChatReply`].
fn from_api_response(json: &serde_json::Value) -> Result<ChatReply, ModelError> {
    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| ModelError::InvalidResponse("response has no choices".into()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|i| i.as_str())
                .unwrap_or_default()
                .to_string();
            let function = call
                .get("function")
                .ok_or_else(|| ModelError::InvalidResponse("tool call without function".into()))?;
            let name = function
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| ModelError::InvalidResponse("tool call without name".into()))?
                .to_string();
            let arguments = match function.get("arguments") {
                Some(serde_json::Value::String(raw)) => serde_json::from_str(raw)
                    .map_err(|e| ModelError::InvalidResponse(format!("tool arguments: {e}")))?,
                Some(value) => value.clone(),
                None => serde_json::json!({}),
            };
            tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    let usage = TokenUsage {
        input_tokens: json
            .pointer("/usage/prompt_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        output_tokens: json
            .pointer("/usage/completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
    };

    Ok(ChatReply {
        text,
        tool_calls,
        usage,
    })
}
