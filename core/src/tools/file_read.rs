use std::path::PathBuf;
use std::sync::Arc;

use agent_protocol::ToolResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::freshness::FreshnessTracker;
use crate::registry::ToolContext;
use crate::registry::ToolHandler;

#[derive(Deserialize)]
struct Args {
    path: PathBuf,
}

pub struct FileReadHandler {
    freshness: Arc<FreshnessTracker>,
}

impl FileReadHandler {
    pub fn new(freshness: Arc<FreshnessTracker>) -> Self {
        Self { freshness }
    }
}

#[async_trait]
impl ToolHandler for FileReadHandler {
    async fn invoke(&self, args: Value, _ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: Args = serde_json::from_value(args)?;
        let content = tokio::fs::read_to_string(&args.path).await?;
        self.freshness.update_read(&args.path);
        Ok(ToolResult::text(content))
    }
}
