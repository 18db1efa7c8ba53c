//! Freshness Tracker (C3, §4.3): per-path read/edit bookkeeping that guards
//! file-edit and file-write handlers against silently overwriting an
//! externally modified file.
//!
//! Freshness is orthogonal to the Permission Engine (§9): it runs inside
//! the handler, not the engine, and a violation is a `ToolError`, not an
//! `Interrupt`.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use agent_protocol::FreshnessRecord;
use chrono::DateTime;
use chrono::Utc;

#[derive(Default)]
pub struct FreshnessTracker {
    records: Mutex<HashMap<PathBuf, FreshnessRecord>>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_read(&self, path: &Path) {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let record = records.entry(path.to_path_buf()).or_default();
        record.last_read = Some(Utc::now());
        record.read_count += 1;
        // A read re-establishes ground truth.
        record.last_agent_edit = None;
    }

    pub fn update_agent_edit(&self, path: &Path) {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let record = records.entry(path.to_path_buf()).or_default();
        record.last_agent_edit = Some(Utc::now());
    }

    pub fn reset(&self, path: &Path) {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).remove(path);
    }

    /// Decision table (§4.3). Returns `(needs_read, reason)`.
    pub fn check(&self, path: &Path) -> (bool, String) {
        let external_mtime = file_mtime(path);
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let record = match records.get(path) {
            Some(r) => r,
            None => return (true, "must read before modify".to_string()),
        };

        let Some(mtime) = external_mtime else {
            return (true, "inaccessible".to_string());
        };

        if let Some(agent_edit) = record.last_agent_edit {
            return if mtime > agent_edit {
                (true, "externally modified".to_string())
            } else {
                (false, "agent has latest".to_string())
            };
        }

        if let Some(read) = record.last_read {
            return if mtime > read {
                (true, "externally modified".to_string())
            } else {
                (false, "unchanged".to_string())
            };
        }

        (true, "must read before modify".to_string())
    }
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_path_needs_read() {
        let tracker = FreshnessTracker::new();
        let (needs_read, reason) = tracker.check(Path::new("/no/such/path"));
        assert!(needs_read);
        assert_eq!(reason, "must read before modify");
    }

    #[test]
    fn read_then_check_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();

        let tracker = FreshnessTracker::new();
        tracker.update_read(&path);
        let (needs_read, reason) = tracker.check(&path);
        assert!(!needs_read);
        assert_eq!(reason, "unchanged");
    }

    #[test]
    fn agent_edit_without_reread_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();

        let tracker = FreshnessTracker::new();
        tracker.update_read(&path);
        tracker.update_agent_edit(&path);
        let (needs_read, reason) = tracker.check(&path);
        assert!(!needs_read);
        assert_eq!(reason, "agent has latest");
    }

    #[test]
    fn missing_file_is_inaccessible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::File::create(&path).unwrap();

        let tracker = FreshnessTracker::new();
        tracker.update_read(&path);
        std::fs::remove_file(&path).unwrap();

        let (needs_read, reason) = tracker.check(&path);
        assert!(needs_read);
        assert_eq!(reason, "inaccessible");
    }
}
