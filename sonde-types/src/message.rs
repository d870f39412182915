//! Conversation messages.
//!
//! A session transcript is an append-only ordered sequence of [`Message`]s.
//! The `meta` map carries structured side-channel data that must survive in
//! the transcript — native tool calls on assistant messages, the originating
//! call id on observation messages — without polluting the text content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user (or orchestrator-injected) input.
    User,
    /// Model output.
    Assistant,
    /// Tool result fed back to the model.
    Observation,
}

/// Meta key under which an assistant message stores its native tool calls,
/// serialized as a JSON array of [`crate::tool::ToolCall`].
pub const META_TOOL_CALLS: &str = "tool_calls";

/// Meta key under which an observation message stores the id of the tool
/// call it answers.
pub const META_CALL_ID: &str = "call_id";

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The author role.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Optional key-value annotations. Ordered so that serialization is
    /// deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            meta: BTreeMap::new(),
        }
    }

    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An observation message carrying a tool result payload.
    pub fn observation(content: impl Into<String>) -> Self {
        Self::new(Role::Observation, content)
    }

    /// An observation message answering a specific tool call.
    pub fn observation_for(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Observation, content).with_meta(META_CALL_ID, call_id)
    }

    /// Attach a meta entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// The call id this observation answers, if any.
    pub fn call_id(&self) -> Option<&str> {
        self.meta.get(META_CALL_ID).map(String::as_str)
    }
}

/// Rough token estimate for a piece of text (chars / 4 heuristic).
///
/// Good enough for context-budget decisions; never used for billing.
pub fn approx_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Rough token estimate for a whole transcript, including a small
/// per-message overhead for role framing.
pub fn estimate_messages(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| approx_tokens(&m.content) + 4)
        .sum()
}
