//! Backend descriptors and the capability matrix.

use std::time::Duration;

/// Default context window assumed when the caller does not say.
const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

/// Default per-request timeout for model calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Model family prefixes known to lack native structured output and native
/// tool calling — typically local-inference families. Anything not listed
/// is assumed native; callers can always override per backend.
const PROMPT_DRIVEN_FAMILIES: &[&str] = &[
    "llama", "tinyllama", "gemma", "phi", "smollm", "vicuna", "stablelm",
];

fn family_lacks_native(model: &str) -> bool {
    let lowered = model.to_ascii_lowercase();
    PROMPT_DRIVEN_FAMILIES
        .iter()
        .any(|family| lowered.starts_with(family))
}

/// Description of one LLM backend: where it lives and what it can do.
///
/// # Example
///
/// ```
/// use sonde_model::Backend;
///
/// let backend = Backend::new("llama3.2", "http://localhost:11434/v1");
/// assert!(!backend.native_tools);
///
/// let backend = Backend::new("gpt-4o-mini", "https://api.openai.com/v1")
///     .api_key("sk-...");
/// assert!(backend.native_tools);
/// ```
#[derive(Debug, Clone)]
pub struct Backend {
    /// Model identifier sent on every request.
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
    /// Bearer token, if the endpoint wants one.
    pub api_key: Option<String>,
    /// Whether the backend accepts a schema-constrained response format.
    pub native_structured: bool,
    /// Whether the backend emits structured tool calls.
    pub native_tools: bool,
    /// Context window in tokens.
    pub context_window: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Backend {
    /// Describe a backend, inferring capabilities from the model family.
    #[must_use]
    pub fn new(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        let model = model.into();
        let native = !family_lacks_native(&model);
        Self {
            model,
            base_url: base_url.into(),
            api_key: None,
            native_structured: native,
            native_tools: native,
            context_window: DEFAULT_CONTEXT_WINDOW,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the inferred structured-output capability.
    #[must_use]
    pub fn native_structured(mut self, native: bool) -> Self {
        self.native_structured = native;
        self
    }

    /// Override the inferred tool-calling capability.
    #[must_use]
    pub fn native_tools(mut self, native: bool) -> Self {
        self.native_tools = native;
        self
    }

    /// Override the context window.
    #[must_use]
    pub fn context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
