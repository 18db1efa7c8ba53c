//! Built-in tool handlers: minimal, real implementations so the dispatcher,
//! Freshness Tracker, and Permission Engine have something to exercise
//! end-to-end (§8 scenarios name `FileRead`/`FileEdit`/`FileWrite`
//! explicitly).

mod file_edit;
mod file_read;
mod file_write;
mod shell;
mod todo;

pub use file_edit::FileEditHandler;
pub use file_read::FileReadHandler;
pub use file_write::FileWriteHandler;
pub use shell::ShellHandler;
pub use todo::TodoWriteHandler;

use std::sync::Arc;

use agent_protocol::ToolDescriptor;
use serde_json::json;

use crate::bus::EventBus;
use crate::freshness::FreshnessTracker;
use crate::registry::ToolRegistry;

/// Registers the fixture handlers (`FileRead`, `FileWrite`, `FileEdit`,
/// `Shell`, `TodoWrite`) against `registry`. Does not register `Task` —
/// that handler needs a [`crate::subagent::SubAgentFactory`] built from the
/// registry it is about to join, so callers register it separately once
/// the rest of the registry is assembled.
pub fn register_builtin_tools(registry: &mut ToolRegistry, freshness: Arc<FreshnessTracker>, bus: EventBus) {
    registry.register(file_read_descriptor(), Arc::new(FileReadHandler::new(Arc::clone(&freshness))));
    registry.register(file_write_descriptor(), Arc::new(FileWriteHandler::new(Arc::clone(&freshness))));
    registry.register(file_edit_descriptor(), Arc::new(FileEditHandler::new(freshness)));
    registry.register(shell_descriptor(), Arc::new(ShellHandler));
    registry.register(todo_write_descriptor(), Arc::new(TodoWriteHandler::new(bus)));
}

pub fn file_read_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "FileRead",
        true,
        true,
        json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
    )
}

pub fn file_write_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "FileWrite",
        false,
        false,
        json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
            "required": ["path", "content"],
        }),
    )
}

pub fn file_edit_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "FileEdit",
        false,
        false,
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "old_text": {"type": "string"},
                "new_text": {"type": "string"},
            },
            "required": ["path", "old_text", "new_text"],
        }),
    )
}

pub fn shell_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "Shell",
        false,
        false,
        json!({
            "type": "object",
            "properties": {"command": {"type": "array", "items": {"type": "string"}}},
            "required": ["command"],
        }),
    )
}

pub fn todo_write_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "TodoWrite",
        true,
        true,
        json!({
            "type": "object",
            "properties": {"todos": {"type": "array"}},
            "required": ["todos"],
        }),
    )
}
