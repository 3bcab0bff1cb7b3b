use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::MemoryError;
use crate::log::{LearningLog, RecoveryReport};
use crate::policy::{PolicyDocument, PolicySnapshot};
use crate::record::{LogEntry, MemoryRecord};
use crate::Result;

/// Environment variable overriding the default memory directory.
pub const MEMORY_HOME_ENV: &str = "PATCHGUARD_HOME";

/// Memory directory used when [`MEMORY_HOME_ENV`] is not set.
pub const DEFAULT_MEMORY_DIR: &str = ".patchguard/memory";

const LOG_FILE: &str = "learnings.jsonl";
const POLICY_FILE: &str = "policy.json";

struct Inner {
    log: LearningLog,
    policy: PolicyDocument,
}

/// Durable memory shared by repair sessions and the consensus aggregator.
///
/// Layout: `<dir>/learnings.jsonl` + `<dir>/policy.json`. All operations are
/// serialized through one lock, so the store can be shared behind an `Arc`
/// by any number of concurrent sessions.
pub struct MemoryStore {
    dir: PathBuf,
    recovery: RecoveryReport,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("dir", &self.dir)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Open the store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let (log, recovery) = LearningLog::open(dir.join(LOG_FILE))?;
        let policy = PolicyDocument::open(dir.join(POLICY_FILE))?;
        info!(
            dir = %dir.display(),
            records = recovery.records,
            discarded_bytes = recovery.discarded_bytes,
            "memory store opened"
        );

        Ok(Self {
            dir,
            recovery,
            inner: Mutex::new(Inner { log, policy }),
        })
    }

    /// Open the store at `$PATCHGUARD_HOME`, or `.patchguard/memory`.
    pub fn open_default() -> Result<Self> {
        let dir = std::env::var(MEMORY_HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MEMORY_DIR));
        Self::open(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Outcome of the recovery pass run when this store was opened.
    pub fn recovery(&self) -> RecoveryReport {
        self.recovery
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| MemoryError::Poisoned)
    }

    /// Durably append a learning.
    pub fn append(&self, record: MemoryRecord) -> Result<LogEntry> {
        let mut inner = self.lock()?;
        let entry = inner.log.append(record)?;
        debug!(seq = entry.seq, category = %entry.record.category, "learning appended");
        Ok(entry)
    }

    /// All learnings in insertion order.
    pub fn read_all(&self) -> Result<Vec<MemoryRecord>> {
        self.lock()?.log.read_all()
    }

    /// The last `n` learnings, oldest first.
    pub fn recent(&self, n: usize) -> Result<Vec<MemoryRecord>> {
        let mut all = self.read_all()?;
        let skip = all.len().saturating_sub(n);
        Ok(all.split_off(skip))
    }

    pub fn by_category(&self, category: &str) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.category == category)
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.log.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get_policy(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.policy.get(key))
    }

    /// Update one policy value; returns the previous value, if any.
    pub fn set_policy(&self, key: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let value = value.into();
        let mut inner = self.lock()?;
        let previous = inner.policy.set(key, value.clone())?;
        info!(key, value = %value, "policy updated");
        Ok(previous)
    }

    /// Snapshot of the whole policy document.
    pub fn policy(&self) -> Result<PolicySnapshot> {
        Ok(self.lock()?.policy.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::keys;
    use serde_json::json;

    #[test]
    fn fresh_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        assert!(store.is_empty().unwrap());
        assert!(store.policy().unwrap().is_empty());
        assert!(store.recovery().was_clean());
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        for i in 0..7 {
            store
                .append(MemoryRecord::new("bug_fix", format!("fix {i}")))
                .unwrap();
        }
        let recent = store.recent(5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].description, "fix 2");
        assert_eq!(recent[4].description, "fix 6");
        assert_eq!(store.recent(100).unwrap().len(), 7);
    }

    #[test]
    fn by_category_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        store.append(MemoryRecord::new("bug_fix", "a")).unwrap();
        store.append(MemoryRecord::new("pattern", "b")).unwrap();
        store.append(MemoryRecord::new("bug_fix", "c")).unwrap();
        let fixes = store.by_category("bug_fix").unwrap();
        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[1].description, "c");
    }

    #[test]
    fn policy_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        store.set_policy(keys::MIN_QUALITY_SCORE, 8.0).unwrap();
        assert_eq!(
            store.get_policy(keys::MIN_QUALITY_SCORE).unwrap(),
            Some(json!(8.0))
        );
        assert_eq!(
            store.policy().unwrap().get_f64(keys::MIN_QUALITY_SCORE),
            Some(8.0)
        );
    }
}
