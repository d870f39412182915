//! The transport-level backend trait.
//!
//! [`ChatBackend`] is the single seam between the adapter and the wire:
//! the production implementation is [`crate::HttpBackend`]; tests script
//! replies through the same trait. Like the provider traits it is modeled
//! on, it uses RPITIT and is intentionally not object-safe — everything
//! above it is generic over `B: ChatBackend`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sonde_types::{Message, ModelError, TokenUsage, ToolCall, ToolSchema};

/// One chat completion request, already resolved against a
/// [`crate::Backend`] descriptor.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Full conversation, system messages first.
    pub messages: Vec<Message>,
    /// Tool declarations, when native tool calling is requested.
    pub tools: Vec<ToolSchema>,
    /// Native structured-output format, when requested.
    pub response_format: Option<serde_json::Value>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Output token cap.
    pub max_tokens: Option<u32>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// What came back from the backend.
#[derive(Debug, Clone, Default)]
pub struct ChatReply {
    /// Narrative text (may be empty when only tool calls were emitted).
    pub text: String,
    /// Native tool calls, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Token accounting for this call.
    pub usage: TokenUsage,
}

/// A chat-completion transport.
pub trait ChatBackend: Send + Sync {
    /// Send one request and await the full reply.
    fn chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, ModelError>> + Send;
}

impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    fn chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, ModelError>> + Send {
        T::chat(self, request)
    }
}
