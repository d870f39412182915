//! The orchestration configuration surface.

use sonde_model::Backend;

/// Everything a session needs, passed explicitly at construction. There is
/// no global state and no config file handling here.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Backend driving the supervisor loop, clarify, and brief phases.
    pub supervisor_backend: Backend,
    /// Backend driving worker research loops and compression.
    pub worker_backend: Backend,
    /// Backend summarizing raw search results.
    pub summarization_backend: Backend,
    /// Backend writing the final report.
    pub final_report_backend: Backend,
    /// Base URL of the search service.
    pub search_endpoint: String,
    /// Parallel worker cap per fan-out batch (≥ 1).
    pub max_concurrent_units: usize,
    /// Supervisor loop cap (≥ 1).
    pub max_supervisor_iterations: u32,
    /// Per-worker loop cap (≥ 1).
    pub max_worker_iterations: u32,
    /// Session-wide supervisor tool-call budget.
    pub max_total_tool_calls: u32,
    /// Per-worker tool-call budget.
    pub max_worker_tool_calls: u32,
    /// Results kept per search query.
    pub max_results_per_query: usize,
    /// Raw-content truncation before summarization, in characters.
    pub max_content_length: usize,
    /// Total attempts for any structured output.
    pub max_structured_retries: u32,
    /// Transport retries for any model or search call.
    pub max_transport_retries: u32,
    /// Whether the clarify phase runs before the brief.
    pub allow_clarification: bool,
    /// Language for every model-facing prompt and the report.
    pub response_language: Option<String>,
}

impl OrchestratorConfig {
    /// A configuration using one backend for every phase.
    pub fn single_backend(backend: Backend, search_endpoint: impl Into<String>) -> Self {
        Self {
            supervisor_backend: backend.clone(),
            worker_backend: backend.clone(),
            summarization_backend: backend.clone(),
            final_report_backend: backend,
            search_endpoint: search_endpoint.into(),
            max_concurrent_units: 3,
            max_supervisor_iterations: 6,
            max_worker_iterations: 6,
            max_total_tool_calls: 10,
            max_worker_tool_calls: 10,
            max_results_per_query: 5,
            max_content_length: 50_000,
            max_structured_retries: 3,
            max_transport_retries: 3,
            allow_clarification: false,
            response_language: None,
        }
    }

    /// Clamp bounds that must stay ≥ 1.
    pub(crate) fn clamped(mut self) -> Self {
        self.max_concurrent_units = self.max_concurrent_units.max(1);
        self.max_supervisor_iterations = self.max_supervisor_iterations.max(1);
        self.max_worker_iterations = self.max_worker_iterations.max(1);
        self.max_results_per_query = self.max_results_per_query.max(1);
        self
    }
}
