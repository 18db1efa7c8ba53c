//! [`AgentState`] (§3): the per-thread state the runner owns exclusively.

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::message::Message;
use crate::message::ToolCall;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentState {
    pub messages: Vec<Message>,
    /// Tool calls from the latest `Assistant` message still awaiting a
    /// matching `Tool` reply.
    pub pending_tool_calls: Vec<ToolCall>,
    pub iteration: u64,
    pub agent_id: String,
    pub user_canceled: bool,
    pub working_directory: PathBuf,
    /// Id of an `Interrupt` still awaiting a `UserChoice`, set just before
    /// the checkpoint taken at the point the runner parks on it. Lets a
    /// submission router (§4.7) tell a suspended thread apart from one
    /// that is merely busy or one with no run in flight at all.
    #[serde(default)]
    pub pending_interrupt: Option<String>,
}

/// Opaque per-thread persistence handed to a [`crate::checkpoint`]-style
/// store (§4.7, §6). The core crate is the only party that knows how to
/// interpret the payload; callers treat it as a blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointBlob {
    pub payload: serde_json::Value,
}
