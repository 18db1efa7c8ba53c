use std::path::PathBuf;
use std::sync::Arc;

use agent_protocol::ToolResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use similar::ChangeTag;
use similar::TextDiff;

use crate::error::CoreError;
use crate::freshness::FreshnessTracker;
use crate::registry::ToolContext;
use crate::registry::ToolHandler;

#[derive(Deserialize)]
struct Args {
    path: PathBuf,
    old_text: String,
    new_text: String,
}

/// Replaces the first occurrence of `old_text` with `new_text`, guarded by
/// the Freshness Tracker, and reports the change as a unified-diff hunk
/// list (§8 scenario 2).
pub struct FileEditHandler {
    freshness: Arc<FreshnessTracker>,
}

impl FileEditHandler {
    pub fn new(freshness: Arc<FreshnessTracker>) -> Self {
        Self { freshness }
    }
}

#[async_trait]
impl ToolHandler for FileEditHandler {
    async fn invoke(&self, args: Value, _ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: Args = serde_json::from_value(args)?;

        let (needs_read, reason) = self.freshness.check(&args.path);
        if needs_read {
            return Err(CoreError::FreshnessViolation {
                path: args.path.display().to_string(),
                reason,
            }
            .into());
        }

        let original = tokio::fs::read_to_string(&args.path).await?;
        if !original.contains(&args.old_text) {
            anyhow::bail!("old_text not found in {}", args.path.display());
        }
        let updated = original.replacen(&args.old_text, &args.new_text, 1);

        tokio::fs::write(&args.path, &updated).await?;
        self.freshness.update_agent_edit(&args.path);

        let hunks = unified_hunks(&original, &updated);
        Ok(ToolResult::with_artifact(
            format!("edited {}", args.path.display()),
            json!({"patch": {"hunks": hunks}}),
        ))
    }
}

fn unified_hunks(original: &str, updated: &str) -> Vec<String> {
    let diff = TextDiff::from_lines(original, updated);
    diff.iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| {
            let prefix = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            format!("{prefix}{}", change.to_string_lossy().trim_end_matches('\n'))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn edit_produces_diff_hunks_with_expected_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "def foo(): return 4\n").unwrap();

        let freshness = Arc::new(FreshnessTracker::new());
        freshness.update_read(&path);
        let handler = FileEditHandler::new(Arc::clone(&freshness));
        let ctx = crate::registry::test_support::dummy_ctx(dir.path());

        let result = handler
            .invoke(
                serde_json::json!({"path": path, "old_text": "return 4", "new_text": "return 5"}),
                ctx,
            )
            .await
            .unwrap();

        let hunks = result.artifact.unwrap()["patch"]["hunks"].clone();
        let hunks: Vec<String> = serde_json::from_value(hunks).unwrap();
        assert!(hunks.iter().any(|h| h.starts_with('-') && h.contains("return 4")));
        assert!(hunks.iter().any(|h| h.starts_with('+') && h.contains("return 5")));
    }

    #[tokio::test]
    async fn edit_without_prior_read_is_a_freshness_violation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "def foo(): return 4\n").unwrap();

        let freshness = Arc::new(FreshnessTracker::new());
        let handler = FileEditHandler::new(freshness);
        let ctx = crate::registry::test_support::dummy_ctx(dir.path());

        let err = handler
            .invoke(serde_json::json!({"path": path, "old_text": "return 4", "new_text": "return 5"}), ctx)
            .await;
        assert!(err.is_err());
    }
}
