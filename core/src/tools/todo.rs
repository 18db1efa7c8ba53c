use std::collections::HashMap;
use std::sync::Mutex;

use agent_protocol::TodoItem;
use agent_protocol::TodoStatus;
use agent_protocol::ToolResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::bus::BusEvent;
use crate::bus::EventBus;
use crate::bus::EventType;
use crate::registry::ToolContext;
use crate::registry::ToolHandler;

#[derive(Deserialize)]
struct Args {
    todos: Vec<TodoItem>,
}

/// Replaces an agent's todo list, enforcing the "at most one `in_progress`"
/// invariant (§3) before accepting the write, and publishing `TODO_UPDATED`
/// (§4.1) once the write is accepted.
pub struct TodoWriteHandler {
    lists: Mutex<HashMap<String, Vec<TodoItem>>>,
    bus: EventBus,
}

impl TodoWriteHandler {
    pub fn new(bus: EventBus) -> Self {
        Self { lists: Mutex::new(HashMap::new()), bus }
    }

    pub fn list_for(&self, agent_id: &str) -> Vec<TodoItem> {
        self.lists
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ToolHandler for TodoWriteHandler {
    async fn invoke(&self, args: Value, ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: Args = serde_json::from_value(args)?;

        let in_progress = args.todos.iter().filter(|t| t.status == TodoStatus::InProgress).count();
        if in_progress > 1 {
            anyhow::bail!("at most one todo may be in_progress, got {in_progress}");
        }

        let mut ids = args.todos.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
        ids.sort_unstable();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            anyhow::bail!("duplicate todo ids in write");
        }

        let count = args.todos.len();
        self.lists
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(ctx.agent_id.clone(), args.todos);

        self.bus.publish(BusEvent::new(
            EventType::TodoUpdated,
            json!({"agent_id": ctx.agent_id, "count": count}),
        ));

        Ok(ToolResult::with_artifact(format!("{count} todos recorded"), json!({"count": count})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, status: TodoStatus) -> TodoItem {
        TodoItem {
            id: id.to_string(),
            content: "do it".to_string(),
            status,
            priority: agent_protocol::TodoPriority::Medium,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            previous_status: None,
        }
    }

    #[tokio::test]
    async fn rejects_more_than_one_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let handler = TodoWriteHandler::new(EventBus::new());
        let ctx = crate::registry::test_support::dummy_ctx(dir.path());
        let todos = vec![item("1", TodoStatus::InProgress), item("2", TodoStatus::InProgress)];
        let result = handler.invoke(serde_json::json!({"todos": todos}), ctx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn accepts_single_in_progress_and_stores_it() {
        let dir = tempfile::tempdir().unwrap();
        let handler = TodoWriteHandler::new(EventBus::new());
        let ctx = crate::registry::test_support::dummy_ctx(dir.path());
        let todos = vec![item("1", TodoStatus::InProgress), item("2", TodoStatus::Pending)];
        let result = handler.invoke(serde_json::json!({"todos": todos}), ctx).await;
        assert!(result.is_ok());
        assert_eq!(handler.list_for("agent-1").len(), 2);
    }

    #[tokio::test]
    async fn accepted_write_publishes_todo_updated() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicUsize;
        use std::sync::atomic::Ordering;

        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        bus.subscribe_sync(EventType::TodoUpdated, Arc::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        bus.start();

        let handler = TodoWriteHandler::new(bus.clone());
        let ctx = crate::registry::test_support::dummy_ctx(dir.path());
        let todos = vec![item("1", TodoStatus::Pending)];
        handler.invoke(serde_json::json!({"todos": todos}), ctx).await.unwrap();

        bus.stop().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
