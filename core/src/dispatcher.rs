//! Tool Dispatcher (C5, §4.5): parallel vs. serial scheduling, cancellation
//! propagation, and the dedicated Task (sub-agent) lane.
//!
//! A Task handler's child runner shares the parent's
//! [`crate::runner::InterruptResolver`], so its own permission interrupts
//! suspend via ordinary async/await instead of needing a sentinel
//! re-raised up the call stack. See DESIGN.md for the rationale.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use agent_protocol::Message;
use agent_protocol::ToolCall;
use agent_protocol::ToolResult;
use agent_protocol::ToolStatus;
use futures::future::join_all;

use crate::registry::ToolContext;
use crate::registry::ToolRegistry;
use crate::stream::StreamWriter;

/// Name reserved for the sub-agent tool (§4.9). Calls with this name are
/// routed through the dedicated task-slot lane instead of the ordinary
/// parallel/serial partition.
pub const TASK_TOOL_NAME: &str = "Task";

pub struct DispatcherConfig {
    /// Upper bound on concurrently running Task (sub-agent) calls within a
    /// single assistant turn (§4.5: "e.g. 20").
    pub max_task_slots: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_task_slots: 20 }
    }
}

pub struct ToolDispatcher {
    registry: ToolRegistry,
    config: DispatcherConfig,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, config: DispatcherConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatches the ALLOW-approved subset of `calls` (§4.5). `canceled`
    /// is checked before starting each task and between serial executions;
    /// a call not yet started when the flag flips is answered with a
    /// synthesized "user canceled" `Tool` message (§5, §7).
    pub async fn dispatch(
        &self,
        calls: Vec<ToolCall>,
        agent_id: &str,
        cwd: &Path,
        stream: &StreamWriter,
        canceled: Arc<AtomicBool>,
    ) -> Vec<Message> {
        let (task_calls, rest): (Vec<_>, Vec<_>) =
            calls.into_iter().partition(|c| c.name == TASK_TOOL_NAME);
        let (parallel_calls, serial_calls): (Vec<_>, Vec<_>) = rest.into_iter().partition(|c| {
            self.registry
                .descriptor(&c.name)
                .map(|d| d.parallelizable)
                .unwrap_or(false)
        });

        let mut results = Vec::new();

        // Dedicated Task lane, chunked by `max_task_slots`. Slot index is
        // the call's deterministic position within the turn's Task calls,
        // so a resume rebinds the same slot (§4.5, §4.9).
        for (chunk_index, chunk) in task_calls.chunks(self.config.max_task_slots.max(1)).enumerate() {
            if canceled.load(Ordering::SeqCst) {
                results.extend(chunk.iter().map(canceled_message));
                continue;
            }
            let base = chunk_index * self.config.max_task_slots.max(1);
            let futures = chunk.iter().enumerate().map(|(i, call)| {
                self.run_one_cancelable(call.clone(), agent_id, cwd, stream, Arc::clone(&canceled), Some(base + i))
            });
            results.extend(join_all(futures).await);
        }

        if canceled.load(Ordering::SeqCst) {
            results.extend(parallel_calls.iter().chain(serial_calls.iter()).map(canceled_message));
            return results;
        }

        if !parallel_calls.is_empty() {
            let futures = parallel_calls
                .iter()
                .map(|call| self.run_one_cancelable(call.clone(), agent_id, cwd, stream, Arc::clone(&canceled), None));
            results.extend(join_all(futures).await);
        }

        for call in serial_calls {
            if canceled.load(Ordering::SeqCst) {
                results.push(canceled_message(&call));
                continue;
            }
            results.push(self.run_one_cancelable(call, agent_id, cwd, stream, Arc::clone(&canceled), None).await);
        }

        results
    }

    /// Races `run_one` against the cancellation flag so a call already
    /// in flight is actually dropped, not just left to finish, once
    /// `canceled` flips (§4.5, §5).
    async fn run_one_cancelable(
        &self,
        call: ToolCall,
        agent_id: &str,
        cwd: &Path,
        stream: &StreamWriter,
        canceled: Arc<AtomicBool>,
        node_index: Option<usize>,
    ) -> Message {
        let fallback = call.clone();
        tokio::select! {
            biased;
            _ = wait_for_cancel(&canceled) => canceled_message(&fallback),
            message = self.run_one(call, agent_id, cwd, stream, canceled.clone(), node_index) => message,
        }
    }

    async fn run_one(
        &self,
        call: ToolCall,
        agent_id: &str,
        cwd: &Path,
        stream: &StreamWriter,
        canceled: Arc<AtomicBool>,
        node_index: Option<usize>,
    ) -> Message {
        if canceled.load(Ordering::SeqCst) {
            return canceled_message(&call);
        }

        let Some((_descriptor, handler)) = self.registry.get(&call.name) else {
            return Message::tool_result(
                call.id.clone(),
                ToolResult::text(format!("unknown tool: {}", call.name)),
            );
        };

        let tool_id = call.id.clone();
        stream.tool_start(&tool_id, &call.name, call.args.clone(), None);

        let ctx = ToolContext {
            agent_id: agent_id.to_string(),
            tool_id: tool_id.clone(),
            task_id: node_index.map(|i| i.to_string()),
            node_index,
            cwd: cwd.to_path_buf(),
            stream: stream.clone(),
        };

        match handler.invoke(call.args.clone(), ctx).await {
            Ok(tool_result) => {
                stream.tool_end(
                    &tool_id,
                    ToolStatus::Success,
                    tool_result.artifact.clone(),
                    Some(tool_result.content.clone()),
                );
                Message::tool_result(call.id, tool_result)
            }
            Err(e) => {
                let message = format!("error: {e:#}");
                stream.tool_end(&tool_id, ToolStatus::Error, None, Some(message.clone()));
                Message::tool_result(call.id, ToolResult::text(message))
            }
        }
    }
}

fn canceled_message(call: &ToolCall) -> Message {
    Message::tool_result(call.id.clone(), ToolResult::text("user canceled"))
}

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Resolves once `canceled` flips true. Polled rather than notified: the
/// flag is a plain `AtomicBool` shared across the dispatcher, runner, and
/// sub-agent call stacks, with no single owner that could hold a `Notify`.
async fn wait_for_cancel(canceled: &AtomicBool) {
    while !canceled.load(Ordering::SeqCst) {
        tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
    }
}
