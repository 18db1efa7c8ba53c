//! [`FreshnessRecord`] (§3, §4.3): per-path read/edit bookkeeping.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreshnessRecord {
    pub last_read: Option<DateTime<Utc>>,
    pub last_agent_edit: Option<DateTime<Utc>>,
    pub last_external_edit: Option<DateTime<Utc>>,
    pub read_count: u64,
}
