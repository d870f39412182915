#![deny(missing_docs)]
//! Shared contracts for the sonde research engine.
//!
//! These are the lingua franca between the model adapter, the search
//! provider, the tool layer, and the supervisor/worker orchestration:
//! conversation messages, the research brief, tool calls and results,
//! worker tasks and findings, the final report, and the error taxonomy.
//! No I/O lives here.

pub mod brief;
pub mod error;
pub mod message;
pub mod report;
pub mod task;
pub mod tool;

pub use brief::ResearchBrief;
pub use error::{ModelError, RunError, SearchError, ToolError};
pub use message::{approx_tokens, estimate_messages, Message, Role};
pub use report::{FinalReport, RunMetadata, Termination};
pub use task::{Source, TaskId, WorkerFindings, WorkerStatus, WorkerTask};
pub use tool::{TokenUsage, ToolCall, ToolResult, ToolResultKind, ToolSchema};

/// Cooperative cancellation handle threaded through the orchestration.
///
/// Re-exported so downstream crates agree on a single token type without
/// each depending on `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
