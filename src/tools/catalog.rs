//! Concurrent tool catalog: registration, schema export and dispatch.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use tracing::{debug, warn};

use super::context::ToolContext;
use super::traits::Tool;
use crate::types::{Arguments, ToolDefinition, ToolError, ToolResult, ToolSchema};

struct CatalogEntry {
    definition: ToolDefinition,
    tool: Arc<dyn Tool>,
}

/// Shared registry mapping tool name to definition and handler.
///
/// Cloning yields another handle to the same catalog. Registration and
/// dispatch are safe from concurrent runs; no map lock is held while a
/// handler executes.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    entries: Arc<DashMap<String, Arc<CatalogEntry>>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any entry with the same name.
    ///
    /// Returns the definition that was replaced.
    pub fn register<T: Tool + 'static>(&self, tool: T) -> Option<ToolDefinition> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&self, tool: Arc<dyn Tool>) -> Option<ToolDefinition> {
        let definition = tool.definition();
        let name = definition.name.clone();
        let previous = self
            .entries
            .insert(name.clone(), Arc::new(CatalogEntry { definition, tool }))
            .map(|old| old.definition.clone());

        debug!(tool = %name, replaced = previous.is_some(), "Registered tool");
        previous
    }

    pub fn with_tool<T: Tool + 'static>(self, tool: T) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<ToolDefinition> {
        self.entries.get(name).map(|e| e.definition.clone())
    }

    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.entries.get(name).map(|e| Arc::clone(&e.tool))
    }

    pub fn remove(&self, name: &str) -> Option<ToolDefinition> {
        self.entries
            .remove(name)
            .map(|(_, entry)| entry.definition.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All registered definitions, sorted by name.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.entries.iter().map(|e| e.definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Schema list handed to the model, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.list().iter().map(ToolDefinition::schema).collect()
    }

    /// Resolve the tool and validate arguments without invoking the handler.
    pub fn prepare(&self, name: &str, arguments: Arguments) -> Result<PreparedCall, ToolError> {
        let entry = self
            .entries
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| ToolError::unknown_tool(name))?;

        let arguments = entry.definition.prepare(arguments)?;
        Ok(PreparedCall { entry, arguments })
    }

    /// Validate, fill defaults and invoke the handler.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Arguments,
        context: &ToolContext,
    ) -> ToolResult {
        self.prepare(name, arguments)?.invoke(context).await
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.names())
            .finish()
    }
}

/// A validated call ready to run.
pub struct PreparedCall {
    entry: Arc<CatalogEntry>,
    arguments: Arguments,
}

impl PreparedCall {
    pub fn name(&self) -> &str {
        &self.entry.definition.name
    }

    /// Arguments after defaults were filled.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Run the handler. A panic inside the handler becomes [`ToolError::Panicked`].
    pub async fn invoke(self, context: &ToolContext) -> ToolResult {
        let name = self.entry.definition.name.clone();
        let future = self.entry.tool.execute(self.arguments, context);

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = %name, panic = %message, "Tool handler panicked");
                Err(ToolError::panicked(name, message))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
