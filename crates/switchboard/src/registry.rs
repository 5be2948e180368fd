use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{EngineError, EngineResult};
use crate::models::tool::ToolDefinition;

/// An executable tool handler.
///
/// Arguments arrive as parsed JSON (an empty object when the call
/// carried none); the return value can be a string or any other JSON
/// value, which the transport layer stringifies before enveloping.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> anyhow::Result<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn call(&self, arguments: Value) -> anyhow::Result<Value> {
        (self.0)(arguments).await
    }
}

struct Entry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Process-wide table mapping a tool name to its definition and
/// handler. Populated at initialization and read-only during
/// conversation processing; `list` preserves registration order since
/// some models take first-match shortcuts on ambiguous calls.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name fails with
    /// `DuplicateTool`; the table is meant to be immutable after
    /// startup, so a second registration is a wiring bug, not an update.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> EngineResult<()> {
        if self.index.contains_key(&definition.name) {
            return Err(EngineError::DuplicateTool(definition.name.clone()));
        }
        self.index
            .insert(definition.name.clone(), self.entries.len());
        self.entries.push(Entry {
            definition,
            handler,
        });
        Ok(())
    }

    /// Register an async closure as a tool handler.
    pub fn register_fn<F, Fut>(&mut self, definition: ToolDefinition, f: F) -> EngineResult<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(definition, Arc::new(FnHandler(f)))
    }

    pub fn lookup(&self, name: &str) -> EngineResult<Arc<dyn ToolHandler>> {
        self.index
            .get(name)
            .map(|&at| self.entries[at].handler.clone())
            .ok_or_else(|| EngineError::ToolNotFound(name.to_string()))
    }

    /// The advertised tool list, in registration order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .map(|entry| entry.definition.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
