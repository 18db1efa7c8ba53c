//! Tool Registry (C5, §4.5, §6): name → descriptor + handler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use agent_protocol::ToolDescriptor;
use agent_protocol::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

use crate::stream::StreamWriter;

/// Context passed to every handler invocation (§6). `task_id`/`node_index`
/// are set only when the call is running inside a Task (sub-agent) slot.
#[derive(Clone)]
pub struct ToolContext {
    pub agent_id: String,
    pub tool_id: String,
    pub task_id: Option<String>,
    pub node_index: Option<usize>,
    pub cwd: PathBuf,
    pub stream: StreamWriter,
}

/// `invoke(args, context) -> ToolResult` (§6). Handler failures are
/// reported via `anyhow::Error`; the dispatcher converts them into a `Tool`
/// message rather than aborting the run (§7).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, args: Value, ctx: ToolContext) -> anyhow::Result<ToolResult>;
}

#[derive(Clone)]
struct Entry {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    entries: HashMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) {
        self.entries.insert(descriptor.name.clone(), Entry { descriptor, handler });
    }

    pub fn get(&self, name: &str) -> Option<(&ToolDescriptor, Arc<dyn ToolHandler>)> {
        self.entries.get(name).map(|e| (&e.descriptor, Arc::clone(&e.handler)))
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.entries.get(name).map(|e| &e.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Exported to the model as a provider-neutral JSON schema list (§6).
    pub fn schemas(&self) -> Vec<ToolDescriptor> {
        self.entries.values().map(|e| e.descriptor.clone()).collect()
    }

    /// A copy of this registry restricted to `names`, used to build the
    /// tool subset a sub-agent descriptor grants (§4.9).
    pub fn restricted_to(&self, names: &[String]) -> ToolRegistry {
        let entries = self
            .entries
            .iter()
            .filter(|(name, _)| names.iter().any(|n| n == "*" || n == *name))
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        ToolRegistry { entries }
    }

    /// Same as `restricted_to`, minus `excluded` — used to strip the Task
    /// tool from a child agent's registry to bound recursion (§4.9).
    pub fn restricted_excluding(&self, names: &[String], excluded: &str) -> ToolRegistry {
        let mut reg = self.restricted_to(names);
        reg.entries.remove(excluded);
        reg
    }
}
