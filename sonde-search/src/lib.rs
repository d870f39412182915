#![deny(missing_docs)]
//! Search provider: turns a batch of queries into deduplicated,
//! summarized, citable results.
//!
//! The HTTP side speaks the SearXNG JSON interface
//! (`GET {base}/search?q=…&format=json`); any endpoint with that shape
//! works. Each unique result is compressed into a short summary plus key
//! excerpts by the summarization model, degrading to the bare title when
//! summarization fails — a search batch never fails because one result or
//! one query did.

pub mod client;
pub mod provider;
pub mod tool;

pub use client::{RawResult, SearxClient};
pub use provider::{BatchOutcome, QueryFailure, SearchProvider, SearchQueryBatch, SearchResult};
pub use tool::SearchTool;
