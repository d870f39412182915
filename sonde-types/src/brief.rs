//! The research brief.

use serde::{Deserialize, Serialize};

/// Structured statement of what a research session is trying to establish.
///
/// Produced once per session from the initial user messages and immutable
/// afterwards; every worker and the synthesizer read the same brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchBrief {
    /// The question being researched, restated precisely.
    pub question: String,
    /// What a satisfying answer must cover.
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Hard constraints (time range, geography, source kinds, ...).
    #[serde(default)]
    pub constraints: Vec<String>,
    /// BCP 47-ish language tag the report should be written in.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl ResearchBrief {
    /// A minimal brief around a bare question, used when brief synthesis is
    /// skipped (tests, single-shot callers).
    pub fn from_question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            success_criteria: Vec::new(),
            constraints: Vec::new(),
            language: default_language(),
        }
    }

    /// JSON schema for structured brief generation.
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The research question, restated precisely"
                },
                "success_criteria": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "What a complete answer must cover"
                },
                "constraints": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Hard constraints on scope or sources"
                },
                "language": {
                    "type": "string",
                    "description": "Language tag for the final report"
                }
            },
            "required": ["question"]
        })
    }

    /// Render the brief as a prompt block.
    pub fn render(&self) -> String {
        let mut out = format!("Research question: {}", self.question);
        if !self.success_criteria.is_empty() {
            out.push_str("\nSuccess criteria:");
            for c in &self.success_criteria {
                out.push_str("\n- ");
                out.push_str(c);
            }
        }
        if !self.constraints.is_empty() {
            out.push_str("\nConstraints:");
            for c in &self.constraints {
                out.push_str("\n- ");
                out.push_str(c);
            }
        }
        out
    }
}
