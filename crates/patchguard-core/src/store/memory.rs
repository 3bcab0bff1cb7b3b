use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use patchguard_memory::ContentDigest;

use super::{ArtifactStore, Result, StoreError};
use crate::domain::{Artifact, ArtifactKey};

/// In-memory artifact store for tests.
///
/// Faults can be injected for reads (all fail) and writes (succeed a fixed
/// number of times, then fail).
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<ArtifactKey, String>>,
    fail_reads: AtomicBool,
    write_budget: Mutex<Option<usize>>,
    writes: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(self, key: &ArtifactKey, content: impl Into<String>) -> Self {
        self.insert(key, content);
        self
    }

    /// Seed or overwrite content without counting as a write.
    pub fn insert(&self, key: &ArtifactKey, content: impl Into<String>) {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), content.into());
    }

    pub fn content(&self, key: &ArtifactKey) -> Option<String> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Let the next `n` writes succeed and fail every write after that.
    pub fn fail_writes_after(&self, n: usize) {
        *self.write_budget.lock().unwrap_or_else(|e| e.into_inner()) = Some(n);
    }

    pub fn clear_faults(&self) {
        self.fail_reads(false);
        *self.write_budget.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn read(&self, key: &ArtifactKey) -> Result<Artifact> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("injected read failure")));
        }
        self.content(key)
            .map(|content| Artifact::new(key.clone(), content))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn write(&self, key: &ArtifactKey, content: &str) -> Result<ContentDigest> {
        {
            let mut budget = self.write_budget.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(StoreError::Io(std::io::Error::other(
                        "injected write failure",
                    )));
                }
                *remaining -= 1;
            }
        }
        self.insert(key, content);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(ContentDigest::from_bytes(content.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_budget_is_enforced() {
        let key = ArtifactKey::new("app.py").unwrap();
        let store = MemoryArtifactStore::new().with_artifact(&key, "v0");
        store.fail_writes_after(1);
        assert!(store.write(&key, "v1").is_ok());
        assert!(store.write(&key, "v2").is_err());
        assert_eq!(store.content(&key).as_deref(), Some("v1"));
        assert_eq!(store.writes(), 1);

        store.clear_faults();
        assert!(store.write(&key, "v3").is_ok());
    }

    #[test]
    fn read_faults() {
        let key = ArtifactKey::new("app.py").unwrap();
        let store = MemoryArtifactStore::new().with_artifact(&key, "v0");
        store.fail_reads(true);
        assert!(matches!(store.read(&key), Err(StoreError::Io(_))));
        store.fail_reads(false);
        assert_eq!(store.read(&key).unwrap().content, "v0");
    }
}
