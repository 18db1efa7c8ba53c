//! The conversation log: [`Message`] and the [`ToolCall`]s an assistant turn emits.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A single request to invoke a tool, as emitted by the model on an
/// `Assistant` turn. `id` is unique within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// Token accounting reported by the model provider for a single turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A tool's reply to one [`ToolCall`], appended to the log as a `Tool`
/// message. `artifact` carries structured data a handler wants to expose to
/// the dispatcher or UI without forcing it through the textual `content`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Value>,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(content: impl Into<String>, artifact: Value) -> Self {
        Self {
            content: content.into(),
            artifact: Some(artifact),
        }
    }
}

/// Tagged union forming the ordered conversation log.
///
/// Invariant (§3): for every `Assistant` message carrying `tool_calls` with
/// ids `{i1..in}`, before the next `Assistant` appears the log contains
/// exactly one `Tool` message per `call_id`, no duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        text: String,
    },
    User {
        text: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    Tool {
        call_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact: Option<Value>,
    },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: Some(text.into()),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, result: ToolResult) -> Self {
        Self::Tool {
            call_id: call_id.into(),
            content: result.content,
            artifact: result.artifact,
        }
    }

    /// The tool calls of an `Assistant` message, or an empty slice otherwise.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// A very rough token estimate (chars / 4) used by the Context
    /// Compactor's token-pressure check. Real token counting is a
    /// provider-specific concern left to the `LlmClient` implementation;
    /// this estimate is only used to decide *whether* to ask the client for
    /// an authoritative count.
    pub fn estimate_tokens(&self) -> usize {
        let len = match self {
            Message::System { text } | Message::User { text } => text.len(),
            Message::Assistant { text, tool_calls, .. } => {
                text.as_deref().map_or(0, str::len)
                    + tool_calls.iter().map(|c| c.name.len() + c.args.to_string().len()).sum::<usize>()
            }
            Message::Tool { content, .. } => content.len(),
        };
        len.div_ceil(4)
    }
}
