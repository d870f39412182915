#![deny(missing_docs)]
//! Uniform callable surface over heterogeneous LLM backends.
//!
//! Backends differ in whether they natively support schema-constrained
//! output and tool calling. [`ModelAdapter`] records both flags per
//! [`Backend`] and offers three operations that behave identically either
//! way:
//!
//! - [`ModelAdapter::complete`] — free-form generation
//! - [`ModelAdapter::complete_structured`] — a value conforming to a JSON
//!   schema, via the backend's structured mode or a JSON-mode prompt with
//!   extraction, validation, and feedback retries
//! - [`ModelAdapter::complete_with_tools`] — tool calls, native or emulated
//!   through the ReAct text protocol
//!
//! All capability branching happens inside this crate; callers never probe
//! a backend.

pub mod adapter;
pub mod backend;
pub mod descriptor;
pub mod http;
pub mod normalize;
pub mod retry;

mod extract;
mod validate;

pub use adapter::{CallParams, Completion, ModelAdapter, Structured, ToolTurn};
pub use backend::{ChatBackend, ChatReply, ChatRequest};
pub use descriptor::Backend;
pub use http::HttpBackend;
pub use normalize::{normalize_arguments, AliasTable};
pub use retry::RetryPolicy;
