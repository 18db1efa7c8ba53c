//! Submission Router (C7, §4.7): classifies an incoming `Submission` against
//! its thread's last checkpointed `AgentState` as a resume, a busy-queue
//! append, or the seed for a fresh run. A reference submission loop
//! (`codex.rs`'s `Op::UserInput` arm) collapses this into a single
//! `inject_input`-or-spawn check on a live `Session`; this runner persists
//! `AgentState` as an opaque blob between turns rather than holding a
//! resident `Session`, so the same three-way decision is reconstructed here
//! from checkpoint shape instead of in-memory task state.

use std::path::Path;
use std::sync::Arc;

use agent_protocol::AgentState;
use agent_protocol::Message;
use agent_protocol::Op;
use agent_protocol::Submission;
use agent_protocol::UserChoice;

use crate::checkpoint::Checkpointer;
use crate::error::Result;
use crate::input_queue::InputQueue;
use crate::runner::ChannelInterruptResolver;
use crate::stream::StreamWriter;

/// Outcome of routing a [`Submission`] against its thread's checkpointed
/// state.
#[derive(Debug)]
pub enum Classification {
    /// The thread was parked on an `Interrupt`; the choice has already been
    /// delivered to whatever resolver call is waiting on it. `delivered` is
    /// `false` if the interrupt had already been answered or was unknown —
    /// a stale or duplicate resume, not an error.
    Resumed { interrupt_id: String, delivered: bool },
    /// A turn is still in flight (the checkpoint has a next runnable node);
    /// the submission's text was appended to the Input Queue instead of
    /// starting a new run.
    Busy,
    /// No run was in flight for this thread; `initial_state` is ready to
    /// hand to [`crate::runner::AgentRunner::run`] as a new turn.
    Fresh { initial_state: AgentState },
    /// `Op::Interrupt`: an out-of-band cancel request. Not itself an
    /// `AgentState` transition — the caller still has to flip its own
    /// cancellation flag and let the runner's loop observe it.
    Canceled,
}

/// Routes submissions for every thread sharing a [`Checkpointer`],
/// [`ChannelInterruptResolver`], and [`InputQueue`] — the same three
/// collaborators [`crate::runner::AgentRunner`] and its compensation loop
/// already depend on.
pub struct SubmissionRouter {
    checkpointer: Arc<dyn Checkpointer>,
    resolver: Arc<ChannelInterruptResolver>,
    input_queue: Arc<InputQueue>,
}

impl SubmissionRouter {
    pub fn new(checkpointer: Arc<dyn Checkpointer>, resolver: Arc<ChannelInterruptResolver>, input_queue: Arc<InputQueue>) -> Self {
        Self { checkpointer, resolver, input_queue }
    }

    pub async fn route(&self, submission: Submission, stream: &StreamWriter, working_directory: &Path) -> Result<Classification> {
        match submission.op {
            Op::Interrupt => Ok(Classification::Canceled),
            Op::Resume { interrupt_id, choice } => {
                let delivered = self.resolver.deliver(&interrupt_id, choice);
                Ok(Classification::Resumed { interrupt_id, delivered })
            }
            Op::UserInput { text } => self.route_user_input(&submission.thread_id, text, stream, working_directory).await,
        }
    }

    async fn route_user_input(
        &self,
        thread_id: &str,
        text: String,
        stream: &StreamWriter,
        working_directory: &Path,
    ) -> Result<Classification> {
        let checkpointed = self
            .checkpointer
            .get(thread_id)
            .await?
            .and_then(|blob| serde_json::from_value::<AgentState>(blob.payload).ok());

        let Some(state) = checkpointed else {
            return Ok(Classification::Fresh { initial_state: fresh_state(thread_id, text, working_directory) });
        };

        if let Some(interrupt_id) = state.pending_interrupt.clone() {
            let choice = UserChoice::from_ordinal(&text).unwrap_or(UserChoice::Deny);
            let delivered = self.resolver.deliver(&interrupt_id, choice);
            return Ok(Classification::Resumed { interrupt_id, delivered });
        }

        if !state.pending_tool_calls.is_empty() {
            self.input_queue.put(text.clone());
            stream.user_input_queued(&text);
            return Ok(Classification::Busy);
        }

        let mut initial_state = state;
        initial_state.user_canceled = false;
        initial_state.messages.push(Message::user(text));
        Ok(Classification::Fresh { initial_state })
    }
}

fn fresh_state(thread_id: &str, text: String, working_directory: &Path) -> AgentState {
    let mut state = AgentState {
        agent_id: thread_id.to_string(),
        working_directory: working_directory.to_path_buf(),
        ..AgentState::default()
    };
    state.messages.push(Message::user(text));
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointer;
    use crate::runner::InterruptResolver;
    use agent_protocol::CheckpointBlob;
    use agent_protocol::Interrupt;
    use agent_protocol::InterruptKind;
    use agent_protocol::ToolCall;
    use tokio::sync::mpsc;

    fn router(checkpointer: Arc<dyn Checkpointer>) -> SubmissionRouter {
        SubmissionRouter::new(checkpointer, Arc::new(ChannelInterruptResolver::new()), Arc::new(InputQueue::new()))
    }

    fn stream() -> StreamWriter {
        let (tx, _rx) = mpsc::unbounded_channel();
        StreamWriter::new("run-1", tx)
    }

    fn submission(thread_id: &str, text: &str) -> Submission {
        Submission { id: "sub-1".to_string(), thread_id: thread_id.to_string(), op: Op::UserInput { text: text.to_string() } }
    }

    #[tokio::test]
    async fn unknown_thread_is_fresh() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
        let router = router(checkpointer);
        let outcome = router.route(submission("thread-1", "hello"), &stream(), Path::new("/work")).await.unwrap();
        match outcome {
            Classification::Fresh { initial_state } => {
                assert_eq!(initial_state.agent_id, "thread-1");
                assert_eq!(initial_state.messages.len(), 1);
            }
            _ => panic!("expected Fresh"),
        }
    }

    #[tokio::test]
    async fn thread_with_pending_tool_calls_is_busy() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
        let state = AgentState {
            agent_id: "thread-1".to_string(),
            pending_tool_calls: vec![ToolCall { id: "call-1".to_string(), name: "Shell".to_string(), args: serde_json::json!({}) }],
            ..AgentState::default()
        };
        checkpointer.put("thread-1", CheckpointBlob { payload: serde_json::to_value(&state).unwrap() }).await.unwrap();

        let router = router(checkpointer);
        let outcome = router.route(submission("thread-1", "still there?"), &stream(), Path::new("/work")).await.unwrap();
        assert!(matches!(outcome, Classification::Busy));
        assert_eq!(router.input_queue.pop_all(), vec!["still there?"]);
    }

    #[tokio::test]
    async fn thread_with_pending_interrupt_resumes() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
        let state = AgentState {
            agent_id: "thread-1".to_string(),
            pending_interrupt: Some("interrupt-1".to_string()),
            ..AgentState::default()
        };
        checkpointer.put("thread-1", CheckpointBlob { payload: serde_json::to_value(&state).unwrap() }).await.unwrap();

        let resolver = Arc::new(ChannelInterruptResolver::new());
        let router = SubmissionRouter::new(checkpointer, Arc::clone(&resolver), Arc::new(InputQueue::new()));

        let waiting = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move {
                resolver
                    .resolve(Interrupt {
                        id: "interrupt-1".to_string(),
                        kind: InterruptKind::PermissionRequest,
                        payload: serde_json::json!({}),
                        tool_call: ToolCall { id: "call-1".to_string(), name: "Shell".to_string(), args: serde_json::json!({}) },
                    })
                    .await
            }
        });

        // Give the spawned resolve() a chance to park its oneshot before the
        // router tries to deliver to it.
        tokio::task::yield_now().await;

        let outcome = router.route(submission("thread-1", "1"), &stream(), Path::new("/work")).await.unwrap();
        match outcome {
            Classification::Resumed { interrupt_id, delivered } => {
                assert_eq!(interrupt_id, "interrupt-1");
                assert!(delivered);
            }
            _ => panic!("expected Resumed"),
        }
        assert_eq!(waiting.await.unwrap(), UserChoice::AllowOnce);
    }

    #[tokio::test]
    async fn completed_thread_with_no_pending_state_is_fresh() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
        let state = AgentState { agent_id: "thread-1".to_string(), user_canceled: true, ..AgentState::default() };
        checkpointer.put("thread-1", CheckpointBlob { payload: serde_json::to_value(&state).unwrap() }).await.unwrap();

        let router = router(checkpointer);
        let outcome = router.route(submission("thread-1", "one more try"), &stream(), Path::new("/work")).await.unwrap();
        match outcome {
            Classification::Fresh { initial_state } => assert!(!initial_state.user_canceled),
            _ => panic!("expected Fresh"),
        }
    }

    #[tokio::test]
    async fn explicit_resume_op_delivers_directly() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
        let resolver = Arc::new(ChannelInterruptResolver::new());
        let router = SubmissionRouter::new(checkpointer, Arc::clone(&resolver), Arc::new(InputQueue::new()));

        let waiting = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move {
                resolver
                    .resolve(Interrupt {
                        id: "interrupt-2".to_string(),
                        kind: InterruptKind::PermissionRequest,
                        payload: serde_json::json!({}),
                        tool_call: ToolCall { id: "call-1".to_string(), name: "Shell".to_string(), args: serde_json::json!({}) },
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        let sub = Submission {
            id: "sub-2".to_string(),
            thread_id: "thread-1".to_string(),
            op: Op::Resume { interrupt_id: "interrupt-2".to_string(), choice: UserChoice::Deny },
        };
        let outcome = router.route(sub, &stream(), Path::new("/work")).await.unwrap();
        assert!(matches!(outcome, Classification::Resumed { delivered: true, .. }));
        assert_eq!(waiting.await.unwrap(), UserChoice::Deny);
    }

    #[tokio::test]
    async fn interrupt_op_is_canceled_without_touching_state() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
        let router = router(checkpointer);
        let sub = Submission { id: "sub-3".to_string(), thread_id: "thread-1".to_string(), op: Op::Interrupt };
        let outcome = router.route(sub, &stream(), Path::new("/work")).await.unwrap();
        assert!(matches!(outcome, Classification::Canceled));
    }
}
