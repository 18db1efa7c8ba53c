//! Checkpointer (C7, §4.7, §6): opaque durable snapshots of `AgentState`
//! keyed by run id, written at every state-machine transition so a run can
//! resume after a crash or a deliberate pause on an `Interrupt`.

use std::collections::HashMap;
use std::sync::Mutex;

use agent_protocol::CheckpointBlob;
use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn put(&self, run_id: &str, blob: CheckpointBlob) -> Result<()>;
    async fn get(&self, run_id: &str) -> Result<Option<CheckpointBlob>>;
    async fn delete(&self, run_id: &str) -> Result<()>;
}

/// Process-memory checkpointer used by tests and as the default when no
/// durable store is configured. A production deployment swaps this for a
/// file- or database-backed implementation behind the same trait.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    blobs: Mutex<HashMap<String, CheckpointBlob>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn put(&self, run_id: &str, blob: CheckpointBlob) -> Result<()> {
        self.blobs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(run_id.to_string(), blob);
        Ok(())
    }

    async fn get(&self, run_id: &str) -> Result<Option<CheckpointBlob>> {
        Ok(self.blobs.lock().unwrap_or_else(|p| p.into_inner()).get(run_id).cloned())
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        self.blobs.lock().unwrap_or_else(|p| p.into_inner()).remove(run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryCheckpointer::new();
        store.put("run-1", CheckpointBlob { payload: json!({"iteration": 3}) }).await.unwrap();
        let loaded = store.get("run-1").await.unwrap().unwrap();
        assert_eq!(loaded.payload["iteration"], 3);
    }

    #[tokio::test]
    async fn get_missing_run_returns_none() {
        let store = InMemoryCheckpointer::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_blob() {
        let store = InMemoryCheckpointer::new();
        store.put("run-1", CheckpointBlob { payload: json!({}) }).await.unwrap();
        store.delete("run-1").await.unwrap();
        assert!(store.get("run-1").await.unwrap().is_none());
    }
}
