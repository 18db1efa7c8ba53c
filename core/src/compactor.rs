//! Context Compactor (C10, §4.10): collapses the message log into an
//! 8-section structured summary once token pressure crosses a configured
//! threshold, via a side `LlmClient::invoke` call.

use agent_protocol::Message;

use crate::error::Result;
use crate::llm::LlmClient;
use crate::stream::StreamWriter;

pub struct CompactorConfig {
    /// Fraction of `token_budget` at or above which `should_compact`
    /// returns true (§4.10, §8: "at exactly 92% compaction runs; at 91.9%
    /// it does not" — the comparison is `>=`, not `>`).
    pub token_threshold_pct: f64,
    pub token_budget: u64,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self { token_threshold_pct: 0.92, token_budget: 128_000 }
    }
}

const COMPACTION_SYSTEM_PROMPT: &str = "\
You are summarizing a coding-agent conversation so it can continue with a \
much shorter context. Produce exactly these eight sections, each with a \
heading: Technical Context, Project Overview, Code Changes, Debugging, \
Current Status, Pending Tasks, User Preferences, Key Decisions. Be precise \
and preserve file paths, identifiers, and open questions verbatim.";

pub struct ContextCompactor {
    config: CompactorConfig,
}

impl ContextCompactor {
    pub fn new(config: CompactorConfig) -> Self {
        Self { config }
    }

    pub fn estimate_tokens(messages: &[Message]) -> u64 {
        messages.iter().map(|m| m.estimate_tokens() as u64).sum()
    }

    pub fn should_compact(&self, messages: &[Message]) -> bool {
        if self.config.token_budget == 0 {
            return false;
        }
        let pct = Self::estimate_tokens(messages) as f64 / self.config.token_budget as f64;
        pct >= self.config.token_threshold_pct
    }

    /// Replaces `messages` with a synthesized `User` marker followed by the
    /// summary `Assistant` message (§4.10). Progress is streamed on a
    /// dedicated `"compaction"` source tag so the UI can show it without
    /// mixing it into normal assistant output.
    pub async fn compact(&self, messages: &[Message], llm: &dyn LlmClient, stream: &StreamWriter) -> Result<Vec<Message>> {
        let compaction_stream = stream.for_source("compaction");
        compaction_stream.message_start("compaction");

        let mut request = vec![Message::system(COMPACTION_SYSTEM_PROMPT)];
        request.extend(messages.iter().cloned());

        let summary = llm.invoke(&request).await?;

        let text = match &summary {
            Message::Assistant { text: Some(text), .. } => text.clone(),
            Message::Assistant { text: None, .. } => String::new(),
            other => other_as_text(other),
        };

        compaction_stream.message_delta("compaction", &text, text.len() / 4);
        compaction_stream.message_end("compaction", None);

        Ok(vec![
            Message::user("[automatic compaction: prior conversation summarized below]"),
            Message::assistant_text(text),
        ])
    }
}

fn other_as_text(message: &Message) -> String {
    match message {
        Message::System { text } | Message::User { text } => text.clone(),
        Message::Tool { content, .. } => content.clone(),
        Message::Assistant { .. } => String::new(),
    }
}
