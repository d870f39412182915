//! The final report and its run metadata.

use serde::{Deserialize, Serialize};

use crate::task::Source;
use crate::tool::TokenUsage;

/// Why the supervisor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model emitted `research_complete`.
    DoneByModel,
    /// The supervisor iteration cap was reached.
    DoneByIterations,
    /// The session tool-call budget was spent.
    DoneByToolBudget,
}

impl Termination {
    /// Whether a cap (rather than the model) ended the session. Reports
    /// produced this way may be incomplete.
    pub fn truncated(self) -> bool {
        !matches!(self, Termination::DoneByModel)
    }
}

/// Accounting attached to a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// How the supervisor loop ended.
    pub termination: Termination,
    /// Supervisor iterations executed.
    pub supervisor_iterations: u32,
    /// Worker tasks dispatched over the whole session.
    pub tasks_dispatched: u32,
    /// Total tokens across supervisor, workers, search summarization, and
    /// synthesis.
    pub usage: TokenUsage,
}

/// The cited long-form answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    /// Markdown body with `[n]` citations and a Sources section.
    pub markdown: String,
    /// Exactly the sources cited in the body, ascending by citation index.
    pub sources: Vec<Source>,
    /// Run accounting, including the truncation flag.
    pub metadata: RunMetadata,
}
