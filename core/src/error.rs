//! Error kinds visible at the core boundary (§7).
//!
//! Tool handler failures are *not* represented here — the dispatcher
//! converts them into `Tool` messages (§4.5, §7) so the model can observe
//! and react. `CoreError` is reserved for failures that end a run or abort
//! startup.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing API key or malformed permission/model rule (§7). Fatal at
    /// startup.
    #[error("config error: {0}")]
    Config(String),

    /// `iteration` exceeded the configured recursion limit (§4.8, §7).
    #[error("recursion limit exceeded after {0} iterations")]
    RecursionLimit(u64),

    /// The agent task loop died unexpectedly (channel closed).
    #[error("internal error: agent loop died unexpectedly")]
    InternalAgentDied,

    /// A mutation was attempted against a path whose on-disk state is not
    /// known to be fresh (§4.3, §7). The caller must re-read.
    #[error("freshness violation for {path}: {reason}")]
    FreshnessViolation { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("llm provider error: {0}")]
    Llm(String),
}
