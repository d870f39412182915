//! The `search` tool wrapper around [`SearchProvider`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sonde_model::ChatBackend;
use sonde_tool::builtin::search_schema;
use sonde_tool::ToolDyn;
use sonde_types::ToolError;

use crate::provider::{SearchProvider, SearchQueryBatch};

/// `search` as an invokable tool.
///
/// Argument parsing is lenient where backends drift: `queries` may arrive
/// as a single string instead of an array.
pub struct SearchTool<B: ChatBackend> {
    provider: Arc<SearchProvider<B>>,
    default_max_results: usize,
}

impl<B: ChatBackend + 'static> SearchTool<B> {
    /// Wrap a provider.
    pub fn new(provider: Arc<SearchProvider<B>>, default_max_results: usize) -> Self {
        Self {
            provider,
            default_max_results: default_max_results.max(1),
        }
    }

    fn parse_batch(&self, arguments: &serde_json::Value) -> Result<SearchQueryBatch, ToolError> {
        let queries = match arguments.get("queries") {
            Some(serde_json::Value::String(q)) => vec![q.clone()],
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        if queries.is_empty() {
            return Err(ToolError::InvalidInput(
                "queries must be a non-empty list of strings".into(),
            ));
        }
        let max = arguments
            .get("max_results_per_query")
            .and_then(|v| v.as_u64())
            .map(|v| v.max(1) as usize)
            .unwrap_or(self.default_max_results);
        Ok(SearchQueryBatch::new(queries).max_results_per_query(max))
    }
}

impl<B: ChatBackend + 'static> ToolDyn for SearchTool<B> {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Run web searches and get back summarized, citable results."
    }

    fn parameters(&self) -> serde_json::Value {
        search_schema().parameters
    }

    fn call(
        &self,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let batch = self.parse_batch(&arguments)?;
            let outcome = self.provider.run(&batch).await;
            let results: Vec<serde_json::Value> = outcome
                .results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "url": r.url,
                        "title": r.title,
                        "summary": r.summary,
                        "key_excerpts": r.key_excerpts,
                    })
                })
                .collect();
            let failures: Vec<serde_json::Value> = outcome
                .failures
                .iter()
                .map(|f| serde_json::json!({"query": f.query, "message": f.message}))
                .collect();
            Ok(serde_json::json!({
                "results": results,
                "failures": failures,
                "usage": {
                    "input_tokens": outcome.usage.input_tokens,
                    "output_tokens": outcome.usage.output_tokens,
                },
            }))
        })
    }
}
