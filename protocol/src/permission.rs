//! Types for the Permission Engine (§3, §4.4).

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allow,
    Deny,
    Ask,
}

/// The user's answer to an `Ask` decision, delivered out-of-band as a resume
/// command (§4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserChoice {
    AllowOnce,
    AllowSession,
    Deny,
}

impl UserChoice {
    /// Parse the three-option choice as delivered over the resume channel
    /// (§8 scenario 3: `"1"` / `"2"` / `"3"`).
    pub fn from_ordinal(s: &str) -> Option<Self> {
        match s.trim() {
            "1" => Some(Self::AllowOnce),
            "2" => Some(Self::AllowSession),
            "3" => Some(Self::Deny),
            _ => None,
        }
    }
}

/// A pending permission decision for one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub tool_name: String,
    pub args: Value,
    pub cwd: PathBuf,
    /// Deterministic fingerprint used for session-cache lookups (§3).
    pub permission_key: String,
}
