//! Provider-neutral LLM adapter (§6). The core state machine only ever
//! talks to [`LlmClient`]; provider wire formats live behind it so the
//! runner stays free of any one vendor's protocol (explicit Non-goal).

mod http;
mod null;

pub use http::HttpLlmClient;
pub use null::NullLlmClient;

use agent_protocol::Message;
use agent_protocol::ToolDescriptor;
use agent_protocol::Usage;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// One piece of an in-progress assistant turn, as emitted by [`LlmClient::stream`].
#[derive(Debug, Clone)]
pub enum AssistantChunk {
    TextDelta(String),
    ToolCall(agent_protocol::ToolCall),
    Done { usage: Option<Usage> },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Streams one assistant turn (§4.8's Reason node). Implementations
    /// emit zero or more `TextDelta`/`ToolCall` chunks followed by exactly
    /// one `Done`.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<BoxStream<'static, Result<AssistantChunk>>>;

    /// A single non-streaming call used for side calls that need a whole
    /// response at once (the Context Compactor's summary request, §4.10).
    async fn invoke(&self, messages: &[Message]) -> Result<Message>;
}
