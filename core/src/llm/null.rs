//! Test fixture client: returns canned text with no tool calls, or replays a
//! fixed queue of responses, so runner tests don't need network access.

use agent_protocol::Message;
use agent_protocol::ToolDescriptor;
use async_trait::async_trait;
use futures::stream;
use futures::stream::BoxStream;
use std::sync::Mutex;

use super::AssistantChunk;
use super::LlmClient;
use crate::error::Result;

/// Replays `responses` in order, one per `stream`/`invoke` call; the last
/// response repeats once the queue is drained.
pub struct NullLlmClient {
    responses: Mutex<Vec<Message>>,
}

impl NullLlmClient {
    pub fn new(responses: Vec<Message>) -> Self {
        Self { responses: Mutex::new(responses) }
    }

    pub fn single(response: Message) -> Self {
        Self::new(vec![response])
    }

    fn next(&self) -> Message {
        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses.first().cloned().unwrap_or_else(|| Message::assistant_text(""))
        }
    }
}

#[async_trait]
impl LlmClient for NullLlmClient {
    async fn stream(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<BoxStream<'static, Result<AssistantChunk>>> {
        let message = self.next();
        let mut chunks = Vec::new();
        if let Message::Assistant { text, tool_calls, usage } = message {
            if let Some(text) = text {
                chunks.push(Ok(AssistantChunk::TextDelta(text)));
            }
            for call in tool_calls {
                chunks.push(Ok(AssistantChunk::ToolCall(call)));
            }
            chunks.push(Ok(AssistantChunk::Done { usage }));
        } else {
            chunks.push(Ok(AssistantChunk::Done { usage: None }));
        }
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn invoke(&self, _messages: &[Message]) -> Result<Message> {
        Ok(self.next())
    }
}
