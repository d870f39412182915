//! Error taxonomy shared across the sonde crates.
//!
//! Policy summary: transport failures are retried with backoff, structured
//! output failures are retried with validator feedback, tool failures
//! become error observations, and budget exits are not errors at all —
//! they are recorded in run metadata.

use std::time::Duration;

/// Errors from the model adapter and its backends.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    // Retryable transport errors
    /// Network-level failure (connection reset, DNS failure, ...).
    #[error("network error: {0}")]
    Network(String),
    /// The request exceeded its timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// The backend rate-limited the request.
    #[error("rate limited")]
    RateLimited,
    /// The backend is temporarily unavailable (5xx).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // Terminal errors
    /// Authentication or authorization failed.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The backend's reply could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The prompt does not fit the backend's context window. Handled by the
    /// caller via pruning, never by blind retry.
    #[error("prompt of ~{prompt_tokens} tokens exceeds the {limit}-token context window")]
    ContextOverflow {
        /// Estimated prompt size.
        prompt_tokens: usize,
        /// The backend's context window.
        limit: usize,
    },
    /// Schema-constrained output never validated within the attempt budget.
    #[error("structured output failed after {attempts} attempts: {last_error}")]
    StructuredOutput {
        /// Attempts consumed.
        attempts: u32,
        /// The final validation failure.
        last_error: String,
    },
    /// The orchestration was cancelled mid-call.
    #[error("cancelled")]
    Cancelled,
}

impl ModelError {
    /// Whether retrying the same request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited | Self::ServiceUnavailable(_)
        )
    }
}

/// Errors from the search provider.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// HTTP request failed before a response arrived.
    #[error("request failed: {0}")]
    RequestFailed(String),
    /// The search service answered with a non-success status.
    #[error("search endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// The response body was not the expected JSON shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from tool dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// The arguments do not satisfy the tool's schema (after alias
    /// normalization).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The tool ran and failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// Execution was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// Top-level errors surfaced to the caller of an orchestration.
///
/// Everything recoverable is absorbed below this level; a run either
/// returns a report or exactly one of these.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A model call failed terminally during a phase that cannot degrade
    /// (brief synthesis, final synthesis).
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    /// The caller's cancellation signal fired; no report was produced.
    #[error("cancelled")]
    Cancelled,
}
