//! Agent Runner (C8, §4.8): the Reason/CheckPermissions/ExecuteTools state
//! machine, an explicit, checkpointed loop over a turn's streamed response
//! and its resulting tool calls.
//!
//! The `TaskNode[i]` state named in §4.8 is folded into `ExecuteTools`: the
//! [`ToolDispatcher`] already runs Task calls through their own bounded lane
//! (§4.5), so there is no separate node here — see DESIGN.md.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::time::Duration;

use agent_protocol::AgentState;
use agent_protocol::CheckpointBlob;
use agent_protocol::Interrupt;
use agent_protocol::InterruptKind;
use agent_protocol::Message;
use agent_protocol::PermissionDecision;
use agent_protocol::ToolCall;
use agent_protocol::ToolResult;
use agent_protocol::UserChoice;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::error as log_error;
use uuid::Uuid;

use crate::bus::BusEvent;
use crate::bus::EventBus;
use crate::bus::EventType;
use crate::checkpoint::Checkpointer;
use crate::compactor::CompactorConfig;
use crate::compactor::ContextCompactor;
use crate::dispatcher::ToolDispatcher;
use crate::error::CoreError;
use crate::error::Result;
use crate::input_queue::InputQueue;
use crate::llm::AssistantChunk;
use crate::llm::LlmClient;
use crate::permissions::PermissionEngine;
use crate::stream::StreamWriter;

/// Resolves an in-band permission [`Interrupt`] to a [`UserChoice`]. Both
/// the top-level runner and a Task sub-agent's child runner share the same
/// resolver implementation, so a sub-agent's own `Ask` decisions surface
/// through the identical path as the parent's — no separate re-raise
/// mechanism is needed (see `dispatcher.rs` module doc).
#[async_trait]
pub trait InterruptResolver: Send + Sync {
    async fn resolve(&self, interrupt: Interrupt) -> UserChoice;
}

/// Bridges the in-process resolver call to an out-of-band `Op::Resume`
/// submission: `resolve` parks a oneshot receiver keyed by interrupt id;
/// whatever drives the submission channel calls [`Self::deliver`] once the
/// user answers.
#[derive(Default)]
pub struct ChannelInterruptResolver {
    pending: Mutex<HashMap<String, oneshot::Sender<UserChoice>>>,
}

impl ChannelInterruptResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `choice` to the still-pending interrupt `interrupt_id`.
    /// Returns `false` if no such interrupt is pending (already resolved or
    /// unknown id).
    pub fn deliver(&self, interrupt_id: &str, choice: UserChoice) -> bool {
        let sender = self.pending.lock().unwrap_or_else(|p| p.into_inner()).remove(interrupt_id);
        match sender {
            Some(sender) => sender.send(choice).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl InterruptResolver for ChannelInterruptResolver {
    async fn resolve(&self, interrupt: Interrupt) -> UserChoice {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap_or_else(|p| p.into_inner()).insert(interrupt.id.clone(), tx);
        rx.await.unwrap_or(UserChoice::Deny)
    }
}

/// Always answers the same way; used by tests and non-interactive runs
/// (e.g. CI fixtures) that never want to block on a real UI.
pub struct AutoResolver(pub UserChoice);

#[async_trait]
impl InterruptResolver for AutoResolver {
    async fn resolve(&self, _interrupt: Interrupt) -> UserChoice {
        self.0
    }
}

pub enum RunOutcome {
    Completed { last_assistant_text: Option<String> },
    Canceled,
}

enum Node {
    Reason,
    CheckPermissions,
    ExecuteTools(Vec<ToolCall>),
    Finished,
}

impl Node {
    fn runner_state(&self) -> RunnerState {
        match self {
            Node::Reason => RunnerState::Reasoning,
            Node::CheckPermissions => RunnerState::CheckingPermissions,
            Node::ExecuteTools(_) => RunnerState::ExecutingTools,
            Node::Finished => RunnerState::Finished,
        }
    }
}

/// The runner's current position in the Reason/CheckPermissions/ExecuteTools
/// loop, queryable from outside a `run` call so other components (the
/// input queue's compensation loop, §4.2) can tell an idle runner from a
/// busy one without reaching into its private state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunnerState {
    Reasoning,
    CheckingPermissions,
    ExecutingTools,
    Finished,
}

impl RunnerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunnerState::Reasoning,
            1 => RunnerState::CheckingPermissions,
            2 => RunnerState::ExecutingTools,
            _ => RunnerState::Finished,
        }
    }
}

pub struct AgentRunner {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    permissions: Arc<PermissionEngine>,
    checkpointer: Arc<dyn Checkpointer>,
    resolver: Arc<dyn InterruptResolver>,
    bus: EventBus,
    compactor: ContextCompactor,
    recursion_limit: u64,
    state: AtomicU8,
}

impl AgentRunner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        dispatcher: ToolDispatcher,
        permissions: Arc<PermissionEngine>,
        checkpointer: Arc<dyn Checkpointer>,
        resolver: Arc<dyn InterruptResolver>,
        bus: EventBus,
        recursion_limit: u64,
    ) -> Self {
        Self {
            llm,
            dispatcher,
            permissions,
            checkpointer,
            resolver,
            bus,
            compactor: ContextCompactor::new(CompactorConfig::default()),
            recursion_limit,
            state: AtomicU8::new(RunnerState::Finished as u8),
        }
    }

    /// The node the runner is currently in, or `Finished` if no `run` call
    /// is in flight (including before the first one).
    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: RunnerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn with_compactor_config(mut self, config: CompactorConfig) -> Self {
        self.compactor = ContextCompactor::new(config);
        self
    }

    async fn checkpoint(&self, state: &AgentState) -> Result<()> {
        let payload = serde_json::to_value(state)?;
        self.checkpointer.put(&state.agent_id, CheckpointBlob { payload }).await
    }

    /// Drives `state` to completion. `input_queue` is `Some` only for the
    /// main agent (§4.8 step 1: "main agent only"); a Task sub-agent's
    /// child runner is given `None`.
    pub async fn run(
        &self,
        mut state: AgentState,
        stream: StreamWriter,
        canceled: Arc<AtomicBool>,
        input_queue: Option<Arc<InputQueue>>,
    ) -> Result<RunOutcome> {
        let mut node = Node::Reason;
        let mut last_assistant_text: Option<String> = None;
        self.bus.publish(BusEvent::new(EventType::SessionStart, json!({"agent_id": state.agent_id})));

        loop {
            if canceled.load(Ordering::SeqCst) && !state.user_canceled {
                state.user_canceled = true;
                self.publish_user_cancel(&state);
                node = Node::Finished;
            }

            self.set_state(node.runner_state());
            node = match node {
                Node::Reason => self.reason(&mut state, &stream, &input_queue, &mut last_assistant_text).await?,
                Node::CheckPermissions => self.check_permissions(&mut state, &stream, &canceled).await?,
                Node::ExecuteTools(approved) => self.execute_tools(&mut state, &stream, &canceled, approved).await?,
                Node::Finished => {
                    self.checkpoint(&state).await?;
                    stream.last_ai_message(last_assistant_text.clone());
                    return Ok(if state.user_canceled {
                        RunOutcome::Canceled
                    } else {
                        RunOutcome::Completed { last_assistant_text }
                    });
                }
            };
        }
    }

    /// Background task (C2, §4.2): a main agent only has its input queue
    /// drained mid-turn by [`Self::reason`]; once a run has actually gone
    /// idle, this loop is what notices new queued input and starts the next
    /// turn instead of leaving it stranded in the queue until some other
    /// caller happens to invoke `run` again.
    pub fn spawn_compensation_loop(
        self: Arc<Self>,
        input_queue: Arc<InputQueue>,
        agent_id: String,
        working_directory: PathBuf,
        stream: StreamWriter,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                ticker.tick().await;
                if self.state() != RunnerState::Finished || input_queue.is_empty() {
                    continue;
                }
                let queued = input_queue.pop_all();
                if queued.is_empty() {
                    continue;
                }

                let mut state = self.load_or_fresh_state(&agent_id, &working_directory).await;
                state.user_canceled = false;
                state.pending_tool_calls.clear();
                for item in queued {
                    state.messages.push(Message::user(item));
                }

                let canceled = Arc::new(AtomicBool::new(false));
                if let Err(err) = self.run(state, stream.clone(), canceled, Some(Arc::clone(&input_queue))).await {
                    log_error!(error = %err, "compensation loop: republished run failed");
                }
            }
        })
    }

    async fn load_or_fresh_state(&self, agent_id: &str, working_directory: &std::path::Path) -> AgentState {
        let checkpointed = self
            .checkpointer
            .get(agent_id)
            .await
            .ok()
            .flatten()
            .and_then(|blob| serde_json::from_value(blob.payload).ok());

        checkpointed.unwrap_or_else(|| AgentState {
            agent_id: agent_id.to_string(),
            working_directory: working_directory.to_path_buf(),
            ..AgentState::default()
        })
    }

    fn publish_user_cancel(&self, state: &AgentState) {
        self.bus.publish(BusEvent::new(EventType::UserCancel, json!({"agent_id": state.agent_id})));
    }

    async fn reason(
        &self,
        state: &mut AgentState,
        stream: &StreamWriter,
        input_queue: &Option<Arc<InputQueue>>,
        last_assistant_text: &mut Option<String>,
    ) -> Result<Node> {
        if let Some(queue) = input_queue {
            let queued = queue.pop_all();
            if !queued.is_empty() {
                for item in &queued {
                    state.messages.push(Message::user(item.clone()));
                }
                stream.user_input_consumed(queued);
            }
        }

        if state.user_canceled {
            return Ok(Node::Finished);
        }

        if self.compactor.should_compact(&state.messages) {
            state.messages = self.compactor.compact(&state.messages, self.llm.as_ref(), stream).await?;
        }

        let tools = self.dispatcher.registry().schemas();
        let mut chunks = self.llm.stream(&state.messages, &tools).await?;

        let message_id = Uuid::new_v4().to_string();
        stream.message_start(&message_id);

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = None;
        while let Some(chunk) = chunks.next().await {
            match chunk? {
                AssistantChunk::TextDelta(delta) => {
                    stream.message_delta(&message_id, &delta, delta.len() / 4);
                    text.push_str(&delta);
                }
                AssistantChunk::ToolCall(call) => tool_calls.push(call),
                AssistantChunk::Done { usage: final_usage } => usage = final_usage,
            }
        }
        stream.message_end(&message_id, usage);

        let assistant_text = if text.is_empty() { None } else { Some(text) };
        *last_assistant_text = assistant_text.clone();
        state.messages.push(Message::Assistant {
            text: assistant_text,
            tool_calls: tool_calls.clone(),
            usage,
        });
        state.iteration += 1;

        if state.iteration > self.recursion_limit {
            // Ends the run through the ordinary `Finished` path (checkpoint,
            // `last_ai_message`) instead of propagating an `Err` out of the
            // loop, so the breach still surfaces as an error-typed stream
            // event rather than an unreported abort (§7).
            stream.error(CoreError::RecursionLimit(state.iteration).to_string());
            state.pending_tool_calls.clear();
            return Ok(Node::Finished);
        }

        if tool_calls.is_empty() {
            state.pending_tool_calls.clear();
            Ok(Node::Finished)
        } else {
            state.pending_tool_calls = tool_calls;
            // Persist the "next runnable node" marker a submission router
            // (§4.7) checks to classify a thread as busy rather than fresh.
            self.checkpoint(state).await?;
            Ok(Node::CheckPermissions)
        }
    }

    async fn check_permissions(&self, state: &mut AgentState, stream: &StreamWriter, canceled: &Arc<AtomicBool>) -> Result<Node> {
        let pending = std::mem::take(&mut state.pending_tool_calls);
        let mut approved = Vec::new();
        let mut denied_by_ask = false;

        for call in pending {
            if denied_by_ask || canceled.load(Ordering::SeqCst) {
                state.messages.push(Message::tool_result(call.id.clone(), ToolResult::text("user canceled")));
                continue;
            }

            let (decision, request) = self.permissions.check(&call.name, &call.args, &state.working_directory);
            match decision {
                PermissionDecision::Allow => approved.push(call),
                PermissionDecision::Deny => {
                    state.messages.push(Message::tool_result(call.id.clone(), ToolResult::text("permission denied")));
                }
                PermissionDecision::Ask => {
                    let interrupt = Interrupt {
                        id: Uuid::new_v4().to_string(),
                        kind: InterruptKind::PermissionRequest,
                        payload: json!({
                            "tool_name": call.name,
                            "args": call.args,
                            "permission_key": request.permission_key,
                        }),
                        tool_call: call.clone(),
                    };
                    stream.interrupt(interrupt.kind.clone(), interrupt.payload.clone(), &interrupt.id);
                    state.pending_interrupt = Some(interrupt.id.clone());
                    self.checkpoint(state).await?;

                    let choice = self.resolver.resolve(interrupt).await;
                    state.pending_interrupt = None;
                    match self.permissions.apply_user_choice(&request, choice) {
                        PermissionDecision::Allow => approved.push(call),
                        _ => {
                            state.messages.push(Message::tool_result(call.id.clone(), ToolResult::text("permission denied")));
                            denied_by_ask = true;
                        }
                    }
                }
            }
        }

        if denied_by_ask {
            state.user_canceled = true;
            self.publish_user_cancel(state);
            return Ok(Node::Finished);
        }

        if approved.is_empty() {
            Ok(Node::Reason)
        } else {
            Ok(Node::ExecuteTools(approved))
        }
    }

    async fn execute_tools(
        &self,
        state: &mut AgentState,
        stream: &StreamWriter,
        canceled: &Arc<AtomicBool>,
        approved: Vec<ToolCall>,
    ) -> Result<Node> {
        let results = self
            .dispatcher
            .dispatch(approved, &state.agent_id, &state.working_directory, stream, Arc::clone(canceled))
            .await;
        state.messages.extend(results);
        self.checkpoint(state).await?;
        Ok(Node::Reason)
    }
}
