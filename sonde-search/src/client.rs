//! HTTP client for a SearXNG-style JSON search endpoint.

use std::time::Duration;

use serde::Deserialize;
use sonde_types::SearchError;

/// Default per-query timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// One raw result as returned by the search service. Absent fields
/// degrade to empty strings rather than failing the query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResult {
    /// Result URL.
    #[serde(default)]
    pub url: String,
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Snippet or page content.
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

/// Client for `GET {base}/search?q=<query>&format=json`.
///
/// # Example
///
/// ```no_run
/// use sonde_search::SearxClient;
///
/// let client = SearxClient::new("http://localhost:8888");
/// ```
#[derive(Clone)]
pub struct SearxClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl SearxClient {
    /// Create a client for the given base URL with a fresh HTTP client.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            http,
        }
    }

    /// Override the per-query timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    /// Run a single query and return the raw results in provider order.
    pub async fn search(&self, query: &str) -> Result<Vec<RawResult>, SearchError> {
        let url = self.search_url();
        tracing::debug!(query, url = %url, "issuing search query");

        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        Ok(parsed.results)
    }
}
