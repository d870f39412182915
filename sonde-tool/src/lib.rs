#![deny(missing_docs)]
//! Tool interface, registry, and dispatcher.
//!
//! Defines the object-safe [`ToolDyn`] trait and the [`ToolRegistry`] that
//! holds a loop's tool set. The tool set is fixed per session: workers get
//! `search` and `reflect`; the supervisor additionally declares
//! `delegate_research` and `research_complete`, which are marker tools —
//! the supervisor loop interprets them itself instead of invoking anything.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sonde_types::{ToolCall, ToolError, ToolResult, ToolSchema};

pub mod builtin;

pub use builtin::{builtin_aliases, ReflectTool};

/// Object-safe trait implemented by every invokable tool.
///
/// Tools are stored as `Arc<dyn ToolDyn>` in the registry. Marker tools
/// (`delegate_research`, `research_complete`) are declared via schemas only
/// and never implement this trait.
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description, shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema of the argument object.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool.
    fn call(
        &self,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>;
}

impl<T: ToolDyn + ?Sized> ToolDyn for Arc<T> {
    fn name(&self) -> &str {
        T::name(self)
    }

    fn description(&self) -> &str {
        T::description(self)
    }

    fn parameters(&self) -> serde_json::Value {
        T::parameters(self)
    }

    fn call(
        &self,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        T::call(self, arguments)
    }
}

/// An ordered collection of tools available to one loop.
///
/// Insertion order is preserved so that the schema listing shown to the
/// model — and therefore the whole transcript — is deterministic.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolDyn>>,
    declarations: Vec<ToolSchema>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            declarations: Vec::new(),
        }
    }

    /// Register an invokable tool. Replaces any tool or declaration with
    /// the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        let schema = ToolSchema {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        };
        self.remove(&schema.name);
        self.declarations.push(schema);
        self.tools.push(tool);
    }

    /// Declare a marker tool: visible to the model, interpreted by the
    /// loop, never dispatched here.
    pub fn declare(&mut self, schema: ToolSchema) {
        self.remove(&schema.name);
        self.declarations.push(schema);
    }

    fn remove(&mut self, name: &str) {
        self.tools.retain(|t| t.name() != name);
        self.declarations.retain(|d| d.name != name);
    }

    /// Look up an invokable tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// The schema of a declaration (invokable or marker) by name.
    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.declarations.iter().find(|d| d.name == name)
    }

    /// All declarations in registration order, as shown to the model.
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.declarations
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Route a parsed call to its tool and produce a [`ToolResult`].
    ///
    /// Failures of any kind become error results — the model sees them as
    /// observations and can adjust; they never abort the loop.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(schema) = self.schema(&call.name) else {
            return ToolResult::error(
                &call.id,
                ToolError::NotFound(call.name.clone()).to_string(),
            );
        };
        if let Err(e) = validate_required(&schema.parameters, &call.arguments) {
            return ToolResult::error(&call.id, e.to_string());
        }
        let Some(tool) = self.get(&call.name) else {
            // Marker tools reach here only if a loop forgot to intercept
            // them; answer the model rather than crash.
            return ToolResult::error(
                &call.id,
                ToolError::InvalidInput(format!("{} is not invokable here", call.name)).to_string(),
            );
        };
        match tool.call(call.arguments.clone()).await {
            Ok(value) => {
                let payload = serde_json::to_string(&value).unwrap_or_default();
                ToolResult::ok(&call.id, payload)
            }
            Err(e) => ToolResult::error(&call.id, e.to_string()),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that every `required` property of `schema` is present in `args`.
///
/// Runs after alias normalization; a missing parameter here is a parse
/// problem to report to the model, not a crash.
pub fn validate_required(schema: &serde_json::Value, args: &serde_json::Value) -> Result<(), ToolError> {
    let Some(obj) = args.as_object() else {
        return Err(ToolError::InvalidInput(
            "arguments must be a JSON object".into(),
        ));
    };
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    for key in required.iter().filter_map(|k| k.as_str()) {
        if !obj.contains_key(key) {
            return Err(ToolError::InvalidInput(format!(
                "missing required parameter: {key}"
            )));
        }
    }
    Ok(())
}
