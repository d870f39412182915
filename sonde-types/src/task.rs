//! Worker tasks and findings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tool::TokenUsage;

/// Identifier of a worker task, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A one-shot unit of research delegated by the supervisor.
///
/// Tasks are never reassigned; exactly one [`WorkerFindings`] is produced
/// per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTask {
    /// Stable id, assigned in submission order.
    pub id: TaskId,
    /// The sub-question this worker investigates.
    pub sub_question: String,
    /// Why the supervisor delegated this, if it said.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Cap on research-loop iterations.
    pub max_iterations: u32,
    /// Cap on cumulative tool calls.
    pub max_tool_calls: u32,
}

/// A retrieved source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Where the evidence came from.
    pub url: String,
    /// Page or document title.
    pub title: String,
}

/// Terminal status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// The model signalled it was done before hitting any cap.
    Complete,
    /// An iteration, tool-call, or context cap was hit first.
    Exhausted,
    /// A non-retryable error (or cancellation) ended the worker.
    Failed,
}

/// The immutable output of one worker task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFindings {
    /// The task this answers.
    pub task_id: TaskId,
    /// Compressed evidence: bulleted claims, each annotated with at least
    /// one `[n]` source index into `sources`.
    pub compressed_text: String,
    /// Raw notes gathered along the way. Transient — feed compression and
    /// debugging only, never persisted.
    pub raw_notes: Vec<String>,
    /// Sources the claims cite, in first-seen order.
    pub sources: Vec<Source>,
    /// How the worker ended.
    pub status: WorkerStatus,
    /// Error description when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tokens this worker consumed.
    #[serde(default)]
    pub usage: TokenUsage,
}

impl WorkerFindings {
    /// Findings for a worker that failed before producing anything.
    pub fn failed(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            compressed_text: String::new(),
            raw_notes: Vec::new(),
            sources: Vec::new(),
            status: WorkerStatus::Failed,
            error: Some(error.into()),
            usage: TokenUsage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_is_transparent_in_serde() {
        let id = TaskId::new("task-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"task-1\"");
    }

    #[test]
    fn failed_findings_carry_error() {
        let f = WorkerFindings::failed(TaskId::new("task-2"), "cancelled");
        assert_eq!(f.status, WorkerStatus::Failed);
        assert_eq!(f.error.as_deref(), Some("cancelled"));
        assert!(f.sources.is_empty());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&WorkerStatus::Exhausted).unwrap(),
            "\"exhausted\""
        );
    }
}
