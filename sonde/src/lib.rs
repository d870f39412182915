#![deny(missing_docs)]
//! # sonde — umbrella crate
//!
//! Single import surface for the deep research orchestrator: shared
//! contracts, the model adapter, the ReAct codec, tools, search, workers,
//! synthesis, and the supervisor, plus a `prelude` for the happy path.
//!
//! ```no_run
//! use sonde::prelude::*;
//!
//! # async fn demo() -> Result<(), sonde::sonde_types::RunError> {
//! let backend = Backend::new("gpt-4o-mini", "https://api.openai.com/v1").api_key("sk-...");
//! let config = OrchestratorConfig::single_backend(backend, "http://localhost:8888");
//! let orchestrator = Orchestrator::new(config);
//! match orchestrator
//!     .run_question("what is HNSW?", CancellationToken::new())
//!     .await?
//! {
//!     RunOutcome::Report(report) => println!("{}", report.markdown),
//!     RunOutcome::NeedsClarification(question) => println!("{question}"),
//! }
//! # Ok(())
//! # }
//! ```

pub use sonde_model;
pub use sonde_react;
pub use sonde_report;
pub use sonde_search;
pub use sonde_supervisor;
pub use sonde_tool;
pub use sonde_types;
pub use sonde_worker;

/// Happy-path imports for running research sessions.
pub mod prelude {
    pub use sonde_model::{Backend, CallParams, ChatBackend, HttpBackend, ModelAdapter};
    pub use sonde_report::Synthesizer;
    pub use sonde_search::{SearchProvider, SearchTool, SearxClient};
    pub use sonde_supervisor::{Orchestrator, OrchestratorConfig, RunOutcome};
    pub use sonde_tool::{ReflectTool, ToolDyn, ToolRegistry};
    pub use sonde_types::{
        CancellationToken, FinalReport, Message, ResearchBrief, Role, RunError, Source,
        Termination, WorkerFindings, WorkerStatus,
    };
    pub use sonde_worker::{ResearchWorker, WorkerSettings};
}
