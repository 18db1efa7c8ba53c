use std::path::PathBuf;
use std::sync::Arc;

use agent_protocol::ToolResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::freshness::FreshnessTracker;
use crate::registry::ToolContext;
use crate::registry::ToolHandler;

#[derive(Deserialize)]
struct Args {
    path: PathBuf,
    content: String,
}

/// Creates or overwrites a file. Guarded by the Freshness Tracker (§4.3):
/// overwriting a path the agent has neither read nor already written in
/// this session is rejected rather than silently clobbered.
pub struct FileWriteHandler {
    freshness: Arc<FreshnessTracker>,
}

impl FileWriteHandler {
    pub fn new(freshness: Arc<FreshnessTracker>) -> Self {
        Self { freshness }
    }
}

#[async_trait]
impl ToolHandler for FileWriteHandler {
    async fn invoke(&self, args: Value, _ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: Args = serde_json::from_value(args)?;

        if args.path.exists() {
            let (needs_read, reason) = self.freshness.check(&args.path);
            if needs_read {
                return Err(CoreError::FreshnessViolation {
                    path: args.path.display().to_string(),
                    reason,
                }
                .into());
            }
        }

        tokio::fs::write(&args.path, &args.content).await?;
        self.freshness.update_agent_edit(&args.path);
        Ok(ToolResult::text(format!("wrote {} bytes to {}", args.content.len(), args.path.display())))
    }
}
