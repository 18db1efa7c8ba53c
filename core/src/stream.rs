//! Stream Writer (C6, §4.6): per-run typed event emitter consumed by the UI.

use agent_protocol::RunEvent;
use agent_protocol::RunEventKind;
use agent_protocol::ToolStatus;
use agent_protocol::Usage;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::error;

/// Thin wrapper over a `Sender<RunEvent>` with helper constructors, modeled
/// on `Session::send_event` / `notify_exec_command_begin`/`end`-style event
/// emission.
#[derive(Clone)]
pub struct StreamWriter {
    run_id: String,
    source: Option<String>,
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl StreamWriter {
    pub fn new(run_id: impl Into<String>, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self {
            run_id: run_id.into(),
            source: None,
            tx,
        }
    }

    /// A writer that tags every event with `source`, used to relay a
    /// sub-agent's stream into the parent's (§4.9).
    pub fn for_source(&self, source: impl Into<String>) -> Self {
        Self {
            run_id: self.run_id.clone(),
            source: Some(source.into()),
            tx: self.tx.clone(),
        }
    }

    fn emit(&self, kind: RunEventKind) {
        let event = match &self.source {
            Some(source) => RunEvent::from_source(self.run_id.clone(), source.clone(), kind),
            None => RunEvent::new(self.run_id.clone(), kind),
        };
        if self.tx.send(event).is_err() {
            error!("stream writer: receiver dropped, event discarded");
        }
    }

    pub fn message_start(&self, message_id: &str) {
        self.emit(RunEventKind::MessageStart {
            message_id: message_id.to_string(),
        });
    }

    pub fn message_delta(&self, message_id: &str, delta: &str, estimate_tokens: usize) {
        self.emit(RunEventKind::MessageDelta {
            message_id: message_id.to_string(),
            delta: delta.to_string(),
            estimate_tokens,
        });
    }

    pub fn message_end(&self, message_id: &str, usage: Option<Usage>) {
        self.emit(RunEventKind::MessageEnd {
            message_id: message_id.to_string(),
            usage,
        });
    }

    pub fn tool_start(&self, tool_id: &str, tool_name: &str, tool_args: Value, message: Option<String>) {
        self.emit(RunEventKind::ToolStart {
            tool_id: tool_id.to_string(),
            tool_name: tool_name.to_string(),
            tool_args,
            message,
        });
    }

    pub fn tool_delta(&self, tool_id: &str, message: &str) {
        self.emit(RunEventKind::ToolDelta {
            tool_id: tool_id.to_string(),
            message: message.to_string(),
        });
    }

    pub fn tool_end(&self, tool_id: &str, status: ToolStatus, result: Option<Value>, message: Option<String>) {
        self.emit(RunEventKind::ToolEnd {
            tool_id: tool_id.to_string(),
            status,
            result,
            message,
        });
    }

    pub fn interrupt(&self, kind: agent_protocol::InterruptKind, payload: Value, interrupt_id: &str) {
        self.emit(RunEventKind::Interrupt {
            kind,
            payload,
            interrupt_id: interrupt_id.to_string(),
        });
    }

    pub fn user_input_queued(&self, content: &str) {
        self.emit(RunEventKind::UserInputQueued {
            content: content.to_string(),
        });
    }

    pub fn user_input_consumed(&self, content: Vec<String>) {
        self.emit(RunEventKind::UserInputConsumed { content });
    }

    pub fn last_ai_message(&self, message: Option<String>) {
        self.emit(RunEventKind::LastAiMessage { message });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(RunEventKind::Error { message: message.into() });
    }
}
