use std::time::Duration;

use agent_protocol::ToolResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;

use crate::registry::ToolContext;
use crate::registry::ToolHandler;

const MAX_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Deserialize)]
struct Args {
    command: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Runs a command via `tokio::process::Command`. No OS-level sandboxing is
/// applied (explicit Non-goal) — the Permission Engine is the only gate.
pub struct ShellHandler;

#[async_trait]
impl ToolHandler for ShellHandler {
    async fn invoke(&self, args: Value, ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: Args = serde_json::from_value(args)?;
        let Some((program, rest)) = args.command.split_first() else {
            anyhow::bail!("empty command");
        };

        let requested = args.timeout_secs.map(Duration::from_secs).unwrap_or(MAX_TIMEOUT);
        let bound = requested.min(MAX_TIMEOUT);

        let mut command = Command::new(program);
        command.args(rest).current_dir(&ctx.cwd);

        let output = timeout(bound, command.output()).await??;

        let mut content = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            content.push_str("\n--- stderr ---\n");
            content.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        ctx.stream.tool_delta(&ctx.tool_id, &format!("exit status: {}", output.status));

        Ok(ToolResult::text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ShellHandler;
        let ctx = crate::registry::test_support::dummy_ctx(dir.path());
        let result = handler
            .invoke(serde_json::json!({"command": ["echo", "hello"]}), ctx)
            .await
            .unwrap();
        assert!(result.content.contains("hello"));
    }

    #[tokio::test]
    async fn empty_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ShellHandler;
        let ctx = crate::registry::test_support::dummy_ctx(dir.path());
        let result = handler.invoke(serde_json::json!({"command": []}), ctx).await;
        assert!(result.is_err());
    }
}
