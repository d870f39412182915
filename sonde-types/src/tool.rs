//! Tool calls, results, schemas, and token accounting.

use serde::{Deserialize, Serialize};

/// A request by the model to invoke a tool.
///
/// Produced either by a backend with native tool calling or decoded from
/// ReAct-formatted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier correlating the call with its result.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments as a JSON object.
    pub arguments: serde_json::Value,
}

/// Whether a tool invocation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultKind {
    /// The tool ran and produced a payload.
    Ok,
    /// The tool failed; the payload is an error description for the model.
    Error,
}

/// The outcome of a tool invocation, always fed back to the model as an
/// observation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this answers.
    pub call_id: String,
    /// Success or failure.
    pub kind: ToolResultKind,
    /// Payload text shown to the model.
    pub payload: String,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(call_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            kind: ToolResultKind::Ok,
            payload: payload.into(),
        }
    }

    /// An error result. The message is phrased for the model, not the user.
    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            kind: ToolResultKind::Error,
            payload: message.into(),
        }
    }

    /// Whether this is an error result.
    pub fn is_error(&self) -> bool {
        self.kind == ToolResultKind::Error
    }
}

/// Declaration of a tool as presented to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: serde_json::Value,
}

/// Token usage of one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens generated.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Fold another usage record into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}
