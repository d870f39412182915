//! Batch execution: fan out queries, dedup, truncate, summarize.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Deserialize;
use sonde_model::{CallParams, ChatBackend, ModelAdapter};
use sonde_types::{Message, TokenUsage};
use tokio::sync::Semaphore;

use crate::client::{RawResult, SearxClient};

/// Default number of results kept per query.
const DEFAULT_MAX_RESULTS_PER_QUERY: usize = 5;

/// Default cap on raw content handed to the summarizer, in characters.
const DEFAULT_MAX_CONTENT_LENGTH: usize = 50_000;

/// Default concurrent in-flight queries per batch.
const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 4;

/// An ordered batch of queries to run together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQueryBatch {
    /// Queries, in priority order. Never empty.
    pub queries: Vec<String>,
    /// How many results to keep per query.
    pub max_results_per_query: usize,
}

impl SearchQueryBatch {
    /// A batch with the default per-query result cap.
    pub fn new(queries: Vec<String>) -> Self {
        Self {
            queries,
            max_results_per_query: DEFAULT_MAX_RESULTS_PER_QUERY,
        }
    }

    /// Override the per-query result cap.
    #[must_use]
    pub fn max_results_per_query(mut self, max: usize) -> Self {
        self.max_results_per_query = max.max(1);
        self
    }
}

/// A summarized, citable search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Result URL (dedup key).
    pub url: String,
    /// Result title.
    pub title: String,
    /// Raw `title + content`, truncated to the content cap.
    pub raw_content: String,
    /// Model-written summary; falls back to the title when summarization
    /// fails.
    pub summary: String,
    /// Up to five verbatim excerpts worth citing.
    pub key_excerpts: Vec<String>,
    /// When this result was fetched.
    pub fetched_at: SystemTime,
}

/// A query that failed while its siblings proceeded.
#[derive(Debug, Clone)]
pub struct QueryFailure {
    /// The failed query.
    pub query: String,
    /// What went wrong.
    pub message: String,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Deduplicated results. Primary order is input query order; within a
    /// query, provider order.
    pub results: Vec<SearchResult>,
    /// Per-query failures, recorded but not fatal.
    pub failures: Vec<QueryFailure>,
    /// Summarization tokens spent on this batch.
    pub usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct ResultDigest {
    summary: String,
    #[serde(default)]
    key_excerpts: Vec<String>,
}

fn digest_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "maxLength": 800,
                "description": "What this page says that bears on the query"
            },
            "key_excerpts": {
                "type": "array",
                "items": {"type": "string"},
                "maxItems": 5,
                "description": "Verbatim passages worth citing"
            }
        },
        "required": ["summary"]
    })
}

const SUMMARIZE_SYSTEM: &str = "You condense a web page into a short factual summary and up to \
     five verbatim key excerpts. Keep concrete figures, names, and dates.";

/// Runs query batches and summarizes what comes back.
pub struct SearchProvider<B: ChatBackend> {
    client: SearxClient,
    summarizer: Arc<ModelAdapter<B>>,
    max_content_length: usize,
    max_concurrent_queries: usize,
}

impl<B: ChatBackend + 'static> SearchProvider<B> {
    /// Create a provider over a search client and a summarization adapter.
    pub fn new(client: SearxClient, summarizer: Arc<ModelAdapter<B>>) -> Self {
        Self {
            client,
            summarizer,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            max_concurrent_queries: DEFAULT_MAX_CONCURRENT_QUERIES,
        }
    }

    /// Override the raw-content truncation cap.
    #[must_use]
    pub fn max_content_length(mut self, chars: usize) -> Self {
        self.max_content_length = chars.max(1);
        self
    }

    /// Override the per-batch query concurrency bound.
    #[must_use]
    pub fn max_concurrent_queries(mut self, bound: usize) -> Self {
        self.max_concurrent_queries = bound.max(1);
        self
    }

    /// Run a batch: query, dedup by URL, truncate, summarize.
    pub async fn run(&self, batch: &SearchQueryBatch) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        // Queries run concurrently under the bound; results are collected
        // in submission order so the batch is deterministic.
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_queries));
        let mut handles = Vec::with_capacity(batch.queries.len());
        for query in &batch.queries {
            let client = self.client.clone();
            let query = query.clone();
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = client.search(&query).await;
                (query, result)
            }));
        }

        let mut seen = BTreeSet::new();
        let mut unique: Vec<RawResult> = Vec::new();
        for handle in handles {
            let (query, result) = match handle.await {
                Ok(pair) => pair,
                Err(e) => {
                    outcome.failures.push(QueryFailure {
                        query: String::new(),
                        message: format!("query task failed: {e}"),
                    });
                    continue;
                }
            };
            match result {
                Ok(raw_results) => {
                    for raw in raw_results.into_iter().take(batch.max_results_per_query) {
                        if !raw.url.is_empty() && !seen.insert(raw.url.clone()) {
                            continue;
                        }
                        unique.push(raw);
                    }
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "search query failed");
                    outcome.failures.push(QueryFailure {
                        query,
                        message: e.to_string(),
                    });
                }
            }
        }

        for raw in unique {
            let raw_content = truncate_chars(
                format!("{}\n{}", raw.title, raw.content),
                self.max_content_length,
            );
            let (summary, key_excerpts) = self
                .summarize(&raw.title, &raw_content, &mut outcome.usage)
                .await;
            outcome.results.push(SearchResult {
                url: raw.url,
                title: raw.title,
                raw_content,
                summary,
                key_excerpts,
                fetched_at: SystemTime::now(),
            });
        }

        outcome
    }

    /// Summarize one result, degrading to the title on any model failure.
    async fn summarize(
        &self,
        title: &str,
        raw_content: &str,
        usage: &mut TokenUsage,
    ) -> (String, Vec<String>) {
        let messages = [
            Message::system(SUMMARIZE_SYSTEM),
            Message::user(raw_content.to_string()),
        ];
        match self
            .summarizer
            .structured::<ResultDigest>(&messages, &digest_schema(), &CallParams::default())
            .await
        {
            Ok((digest, call_usage)) => {
                usage.add(call_usage);
                let mut excerpts = digest.key_excerpts;
                excerpts.truncate(5);
                (digest.summary, excerpts)
            }
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed, degrading to title");
                (title.to_string(), Vec::new())
            }
        }
    }
}

/// Truncate to at most `max` bytes on a char boundary.
fn truncate_chars(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}
