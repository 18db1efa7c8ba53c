//! Reference [`LlmClient`] over a generic chat-completions-shaped HTTP API,
//! streamed via server-sent events. Intentionally provider-neutral: no
//! vendor-specific request shape. Retries follow an exponential-backoff
//! loop via [`crate::util::backoff`].

use std::time::Duration;

use agent_protocol::Message;
use agent_protocol::ToolCall;
use agent_protocol::ToolDescriptor;
use agent_protocol::Usage;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::AssistantChunk;
use super::LlmClient;
use crate::error::CoreError;
use crate::error::Result;
use crate::util::backoff;

const DEFAULT_MAX_RETRIES: u64 = 4;

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<&'a ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

fn to_wire(message: &Message) -> WireMessage<'_> {
    match message {
        Message::System { text } => WireMessage { role: "system", content: Some(text), tool_calls: Vec::new(), tool_call_id: None },
        Message::User { text } => WireMessage { role: "user", content: Some(text), tool_calls: Vec::new(), tool_call_id: None },
        Message::Assistant { text, tool_calls, .. } => WireMessage {
            role: "assistant",
            content: text.as_deref(),
            tool_calls: tool_calls.iter().collect(),
            tool_call_id: None,
        },
        Message::Tool { call_id, content, .. } => WireMessage {
            role: "tool",
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id),
        },
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    tools: &'a [ToolDescriptor],
    stream: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    TextDelta { text: String },
    ToolCall { id: String, name: String, args: Value },
    Done { usage: Option<Usage> },
}

#[derive(Deserialize)]
struct WireResponse {
    content: Option<String>,
    tool_calls: Vec<ToolCall>,
    usage: Option<Usage>,
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u64,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u64) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/{}", self.base_url.trim_end_matches('/'), path))
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<BoxStream<'static, Result<AssistantChunk>>> {
        let body = WireRequest {
            model: &self.model,
            messages: messages.iter().map(to_wire).collect(),
            tools,
            stream: true,
        };

        let mut attempt = 0u64;
        let response = loop {
            attempt += 1;
            match self.request("chat/stream").json(&body).send().await {
                Ok(resp) if resp.status().is_success() => break resp,
                Ok(resp) if resp.status().is_server_error() && attempt <= self.max_retries => {
                    let delay = backoff(attempt);
                    warn!(status = %resp.status(), ?delay, "llm stream request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) => {
                    let status = resp.status();
                    return Err(CoreError::Llm(format!("request failed with status {status}")));
                }
                Err(e) if attempt <= self.max_retries => {
                    let delay = backoff(attempt);
                    warn!(error = %e, ?delay, "llm stream request error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(CoreError::Llm(e.to_string())),
            }
        };

        let byte_stream = response.bytes_stream().eventsource();
        let mapped = byte_stream.filter_map(|event| async move {
            let event = match event {
                Ok(e) => e,
                Err(e) => return Some(Err(CoreError::Llm(e.to_string()))),
            };
            if event.data.is_empty() {
                return None;
            }
            let parsed: std::result::Result<WireEvent, _> = serde_json::from_str(&event.data);
            match parsed {
                Ok(WireEvent::TextDelta { text }) => Some(Ok(AssistantChunk::TextDelta(text))),
                Ok(WireEvent::ToolCall { id, name, args }) => {
                    Some(Ok(AssistantChunk::ToolCall(ToolCall { id, name, args })))
                }
                Ok(WireEvent::Done { usage }) => Some(Ok(AssistantChunk::Done { usage })),
                Err(e) => {
                    debug!(error = %e, data = %event.data, "dropping unparseable sse event");
                    None
                }
            }
        });

        Ok(Box::pin(mapped))
    }

    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        let body = WireRequest {
            model: &self.model,
            messages: messages.iter().map(to_wire).collect(),
            tools: &[],
            stream: false,
        };

        let mut attempt = 0u64;
        let response = loop {
            attempt += 1;
            match self.request("chat/complete").json(&body).send().await {
                Ok(resp) if resp.status().is_success() => break resp,
                Ok(resp) if resp.status().is_server_error() && attempt <= self.max_retries => {
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Ok(resp) => {
                    let status = resp.status();
                    return Err(CoreError::Llm(format!("request failed with status {status}")));
                }
                Err(e) if attempt <= self.max_retries => {
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(CoreError::Llm(e.to_string())),
            }
        };

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Llm(format!("invalid response body: {e}")))?;

        Ok(Message::Assistant {
            text: parsed.content,
            tool_calls: parsed.tool_calls,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_round_trips_tool_call_ids() {
        let call = ToolCall { id: "c1".into(), name: "Shell".into(), args: serde_json::json!({}) };
        let message = Message::Assistant { text: None, tool_calls: vec![call], usage: None };
        let wire = to_wire(&message);
        assert_eq!(wire.tool_calls.len(), 1);
        assert_eq!(wire.tool_calls[0].id, "c1");
    }
}
