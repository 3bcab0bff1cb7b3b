//! Pre-mutation snapshots.
//!
//! A [`Snapshot`] is the artifact's content at transaction start. When a
//! backup directory is configured, every live snapshot also exists on disk as
//! `<backup_dir>/<tx_id>.snapshot.json` until it is discarded, so a process
//! that dies mid-transaction leaves enough behind to undo its write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use patchguard_memory::ContentDigest;

use crate::domain::{ArtifactKey, IoStage, PatchError, Result};
use crate::store::ArtifactStore;

const SIDECAR_SUFFIX: &str = ".snapshot.json";

/// Immutable copy of an artifact taken at transaction start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tx_id: Uuid,
    pub key: ArtifactKey,
    pub content: String,
    pub digest: ContentDigest,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    fn verify(&self) -> Result<()> {
        let actual = ContentDigest::from_bytes(self.content.as_bytes());
        if actual != self.digest {
            return Err(PatchError::DigestMismatch {
                expected: self.digest.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

/// Captures, restores and discards snapshots against an [`ArtifactStore`].
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn ArtifactStore>,
    backup_dir: Option<PathBuf>,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("backup_dir", &self.backup_dir)
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    /// Snapshots held in memory only.
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            backup_dir: None,
        }
    }

    /// Snapshots mirrored to sidecar files under `dir`.
    pub fn with_backup_dir(store: Arc<dyn ArtifactStore>, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            store,
            backup_dir: Some(dir),
        })
    }

    pub fn backup_dir(&self) -> Option<&Path> {
        self.backup_dir.as_deref()
    }

    pub fn artifact_store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Copy the current content of `key`.
    pub fn capture(&self, key: &ArtifactKey, tx_id: Uuid) -> Result<Snapshot> {
        let artifact = self.store.read(key).map_err(|e| PatchError::Io {
            key: key.to_string(),
            stage: IoStage::Capture,
            reason: e.to_string(),
        })?;

        let snapshot = Snapshot {
            tx_id,
            key: artifact.key,
            content: artifact.content,
            digest: artifact.digest,
            captured_at: Utc::now(),
        };

        if let Some(dir) = &self.backup_dir {
            write_sidecar(dir, &snapshot).map_err(|e| PatchError::Io {
                key: key.to_string(),
                stage: IoStage::Capture,
                reason: format!("writing snapshot sidecar: {e}"),
            })?;
        }

        debug!(key = %key, tx_id = %tx_id, digest = %snapshot.digest.short(), "snapshot captured");
        Ok(snapshot)
    }

    /// Overwrite the artifact with the snapshot's content.
    pub fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        self.store
            .write(&snapshot.key, &snapshot.content)
            .map_err(|e| PatchError::RollbackFailed {
                key: snapshot.key.to_string(),
                tx_id: snapshot.tx_id,
                reason: e.to_string(),
            })?;
        debug!(key = %snapshot.key, tx_id = %snapshot.tx_id, "snapshot restored");
        Ok(())
    }

    /// Release a snapshot. Never fails; sidecar removal errors are logged.
    pub fn discard(&self, snapshot: Snapshot) {
        if let Some(dir) = &self.backup_dir {
            let path = sidecar_path(dir, snapshot.tx_id);
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove snapshot sidecar");
                }
            }
        }
    }

    /// Snapshots left behind by transactions that never resolved.
    pub fn pending(&self) -> Result<Vec<Snapshot>> {
        let Some(dir) = &self.backup_dir else {
            return Ok(Vec::new());
        };

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_sidecar = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SIDECAR_SUFFIX));
            if !is_sidecar {
                continue;
            }
            let bytes = fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            snapshot.verify()?;
            snapshots.push(snapshot);
        }
        snapshots.sort_by_key(|s| s.captured_at);
        Ok(snapshots)
    }

    /// Restore every pending snapshot onto its artifact and drop its sidecar.
    ///
    /// Returns the keys that were restored.
    pub fn recover_pending(&self) -> Result<Vec<ArtifactKey>> {
        let mut restored = Vec::new();
        for snapshot in self.pending()? {
            self.restore(&snapshot)?;
            info!(key = %snapshot.key, tx_id = %snapshot.tx_id, "recovered orphaned snapshot");
            restored.push(snapshot.key.clone());
            self.discard(snapshot);
        }
        Ok(restored)
    }
}

fn sidecar_path(dir: &Path, tx_id: Uuid) -> PathBuf {
    dir.join(format!("{tx_id}{SIDECAR_SUFFIX}"))
}

fn write_sidecar(dir: &Path, snapshot: &Snapshot) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(snapshot)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(sidecar_path(dir, snapshot.tx_id))
        .map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryArtifactStore;

    fn key() -> ArtifactKey {
        ArtifactKey::new("app.py").unwrap()
    }

    fn memory_store(content: &str) -> Arc<MemoryArtifactStore> {
        Arc::new(MemoryArtifactStore::new().with_artifact(&key(), content))
    }

    #[test]
    fn capture_copies_content() {
        let store = memory_store("return 500");
        let snapshots = SnapshotStore::new(store.clone());
        let snap = snapshots.capture(&key(), Uuid::new_v4()).unwrap();
        assert_eq!(snap.content, "return 500");
        assert_eq!(snap.digest, ContentDigest::from_bytes(b"return 500"));
    }

    #[test]
    fn capture_of_missing_artifact_is_io_error() {
        let store = Arc::new(MemoryArtifactStore::new());
        let snapshots = SnapshotStore::new(store);
        let err = snapshots.capture(&key(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(
            err,
            PatchError::Io {
                stage: IoStage::Capture,
                ..
            }
        ));
    }

    #[test]
    fn restore_overwrites_artifact() {
        let store = memory_store("original");
        let snapshots = SnapshotStore::new(store.clone());
        let snap = snapshots.capture(&key(), Uuid::new_v4()).unwrap();
        store.insert(&key(), "candidate");
        snapshots.restore(&snap).unwrap();
        assert_eq!(store.content(&key()).as_deref(), Some("original"));
    }

    #[test]
    fn restore_failure_is_rollback_failed() {
        let store = memory_store("original");
        let snapshots = SnapshotStore::new(store.clone());
        let tx_id = Uuid::new_v4();
        let snap = snapshots.capture(&key(), tx_id).unwrap();
        store.fail_writes_after(0);
        match snapshots.restore(&snap) {
            Err(PatchError::RollbackFailed { tx_id: id, .. }) => assert_eq!(id, tx_id),
            other => panic!("expected RollbackFailed, got {other:?}"),
        }
    }

    #[test]
    fn sidecar_lives_until_discard() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store("original");
        let snapshots = SnapshotStore::with_backup_dir(store, dir.path()).unwrap();
        let snap = snapshots.capture(&key(), Uuid::new_v4()).unwrap();
        assert_eq!(snapshots.pending().unwrap().len(), 1);
        snapshots.discard(snap);
        assert!(snapshots.pending().unwrap().is_empty());
    }

    #[test]
    fn recover_pending_restores_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store("original");
        {
            let snapshots = SnapshotStore::with_backup_dir(store.clone(), dir.path()).unwrap();
            let _orphan = snapshots.capture(&key(), Uuid::new_v4()).unwrap();
            store.insert(&key(), "half-applied candidate");
            // Process dies here: the snapshot is never restored or discarded.
        }

        let snapshots = SnapshotStore::with_backup_dir(store.clone(), dir.path()).unwrap();
        let restored = snapshots.recover_pending().unwrap();
        assert_eq!(restored, vec![key()]);
        assert_eq!(store.content(&key()).as_deref(), Some("original"));
        assert!(snapshots.pending().unwrap().is_empty());
    }

    #[test]
    fn tampered_sidecar_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store("original");
        let snapshots = SnapshotStore::with_backup_dir(store, dir.path()).unwrap();
        let snap = snapshots.capture(&key(), Uuid::new_v4()).unwrap();

        let path = sidecar_path(dir.path(), snap.tx_id);
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("original", "tampered")).unwrap();

        assert!(matches!(
            snapshots.pending(),
            Err(PatchError::DigestMismatch { .. })
        ));
    }
}
