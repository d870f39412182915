//! The fixed tool set and its argument alias tables.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use sonde_types::{ToolError, ToolSchema};

use crate::ToolDyn;

/// Schema of the `search` tool. The invokable implementation lives with
/// the search provider.
pub fn search_schema() -> ToolSchema {
    ToolSchema {
        name: "search".into(),
        description: "Run web searches and get back summarized, citable results.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "description": "Search queries to run"
                },
                "max_results_per_query": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "How many results to keep per query"
                }
            },
            "required": ["queries"]
        }),
    }
}

/// Schema of the `reflect` tool.
pub fn reflect_schema() -> ToolSchema {
    ToolSchema {
        name: "reflect".into(),
        description:
            "Record a reasoning step about what is known so far and what to investigate next."
                .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "reflection": {
                    "type": "string",
                    "description": "The reasoning to record"
                }
            },
            "required": ["reflection"]
        }),
    }
}

/// Schema of the supervisor-only `delegate_research` marker tool.
pub fn delegate_research_schema() -> ToolSchema {
    ToolSchema {
        name: "delegate_research".into(),
        description:
            "Hand a focused sub-question to a parallel researcher. Emit several in one turn to \
             investigate independent angles concurrently."
                .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "sub_question": {
                    "type": "string",
                    "description": "A self-contained sub-question to research"
                },
                "rationale": {
                    "type": "string",
                    "description": "Why this angle matters"
                }
            },
            "required": ["sub_question"]
        }),
    }
}

/// Schema of the supervisor-only `research_complete` marker tool.
pub fn research_complete_schema() -> ToolSchema {
    ToolSchema {
        name: "research_complete".into(),
        description: "Signal that the gathered findings answer the brief and research should stop."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    }
}

/// Argument alias tables, per tool, in application order.
///
/// Weaker backends drift on argument names (singular for plural, synonyms
/// for the free-text field); the adapter renames these to the canonical
/// key before dispatch.
pub fn builtin_aliases() -> BTreeMap<String, Vec<(String, String)>> {
    let mut map = BTreeMap::new();
    map.insert(
        "search".to_string(),
        vec![("query".to_string(), "queries".to_string())],
    );
    map.insert(
        "reflect".to_string(),
        vec![
            ("prompt".to_string(), "reflection".to_string()),
            ("thought".to_string(), "reflection".to_string()),
            ("question".to_string(), "reflection".to_string()),
        ],
    );
    map
}

/// The `reflect` tool. Recording happens in the transcript itself — the
/// call arguments are already there — so execution only acknowledges.
pub struct ReflectTool;

impl ToolDyn for ReflectTool {
    fn name(&self) -> &str {
        "reflect"
    }

    fn description(&self) -> &str {
        "Record a reasoning step about what is known so far and what to investigate next."
    }

    fn parameters(&self) -> serde_json::Value {
        reflect_schema().parameters
    }

    fn call(
        &self,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let reflection = arguments
                .get("reflection")
                .and_then(|r| r.as_str())
                .unwrap_or_default();
            Ok(serde_json::json!({
                "recorded": true,
                "reflection": reflection,
            }))
        })
    }
}
