//! [`RunEvent`] and [`Interrupt`] (§3, §4.6): the closed tagged union streamed
//! to the UI, and the in-band suspension record.
//!
//! Per the Design Note in §9, `Interrupt` (pause for user choice) and
//! `UserCancel` (out-of-band abort, see `agent_core::bus`) are deliberately
//! separate types on separate channels.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::message::ToolCall;
use crate::message::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    PermissionRequest,
}

/// An in-band suspension awaiting a user choice. Created during
/// Reason/CheckPermissions; resolved by a resume command carrying a
/// [`crate::permission::UserChoice`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interrupt {
    pub id: String,
    pub kind: InterruptKind,
    pub payload: Value,
    pub tool_call: ToolCall,
}

/// One chunk of the per-run event stream (§4.6). `source` tags events that
/// originated in a sub-agent so the parent stream can interleave children
/// while preserving per-source order; `None` means "this run".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventKind {
    MessageStart {
        message_id: String,
    },
    MessageDelta {
        message_id: String,
        delta: String,
        estimate_tokens: usize,
    },
    MessageEnd {
        message_id: String,
        usage: Option<Usage>,
    },
    ToolStart {
        tool_id: String,
        tool_name: String,
        tool_args: Value,
        message: Option<String>,
    },
    ToolDelta {
        tool_id: String,
        message: String,
    },
    ToolEnd {
        tool_id: String,
        status: ToolStatus,
        result: Option<Value>,
        message: Option<String>,
    },
    Interrupt {
        kind: InterruptKind,
        payload: Value,
        interrupt_id: String,
    },
    UserInputQueued {
        content: String,
    },
    UserInputConsumed {
        content: Vec<String>,
    },
    /// Internal signaling to a parent run that a sub-agent turn completed.
    /// Emitted at most once per sub-agent run (§8 invariant 3).
    LastAiMessage {
        message: Option<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: String,
    /// Present when this event was relayed from a sub-agent run.
    pub source: Option<String>,
    pub kind: RunEventKind,
}

impl RunEvent {
    pub fn new(run_id: impl Into<String>, kind: RunEventKind) -> Self {
        Self {
            run_id: run_id.into(),
            source: None,
            kind,
        }
    }

    pub fn from_source(run_id: impl Into<String>, source: impl Into<String>, kind: RunEventKind) -> Self {
        Self {
            run_id: run_id.into(),
            source: Some(source.into()),
            kind,
        }
    }
}
