//! Mutation transaction: snapshot, write, validate, then commit or roll back.
//!
//! Outside an in-flight transaction an artifact holds either its
//! pre-transaction content or a candidate that passed validation. The
//! per-artifact lock is held for the whole cycle, so two transactions on the
//! same key never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use patchguard_memory::ContentDigest;

use crate::domain::{
    ArtifactKey, IoStage, PatchError, Result, ValidationCommand, ValidationResult,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::validator::Validator;

/// One async mutex per artifact key.
#[derive(Debug, Default)]
pub struct ArtifactLocks {
    locks: Mutex<HashMap<ArtifactKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ArtifactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &ArtifactKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Result of one resolved transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub tx_id: Uuid,
    pub result: ValidationResult,
    pub committed: bool,
    pub digest_before: ContentDigest,
    /// Equal to `digest_before` when the transaction rolled back.
    pub digest_after: ContentDigest,
}

/// Applies one candidate to one artifact under validation.
#[derive(Clone)]
pub struct MutationTransaction {
    snapshots: SnapshotStore,
    validator: Arc<dyn Validator>,
    locks: Arc<ArtifactLocks>,
}

impl std::fmt::Debug for MutationTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationTransaction")
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

impl MutationTransaction {
    pub fn new(snapshots: SnapshotStore, validator: Arc<dyn Validator>) -> Self {
        Self {
            snapshots,
            validator,
            locks: Arc::new(ArtifactLocks::new()),
        }
    }

    /// Share a lock table with other transaction runners over the same store.
    pub fn with_locks(mut self, locks: Arc<ArtifactLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn locks(&self) -> &Arc<ArtifactLocks> {
        &self.locks
    }

    /// Write `candidate` to `key`, validate it, and keep it only if it passes.
    #[instrument(skip(self, candidate, command), fields(key = %key))]
    pub async fn execute(
        &self,
        key: &ArtifactKey,
        candidate: &str,
        command: &ValidationCommand,
    ) -> Result<TransactionOutcome> {
        let _guard = self.locks.acquire(key).await;
        let tx_id = Uuid::new_v4();

        let snapshot = self.snapshots.capture(key, tx_id)?;
        let digest_before = snapshot.digest.clone();

        let digest_candidate = match self.snapshots.artifact_store().write(key, candidate) {
            Ok(digest) => digest,
            Err(e) => {
                warn!(tx_id = %tx_id, error = %e, "candidate write failed; restoring snapshot");
                self.roll_back(snapshot)?;
                return Err(PatchError::Io {
                    key: key.to_string(),
                    stage: IoStage::Write,
                    reason: e.to_string(),
                });
            }
        };

        let result = match self.validator.run(command).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tx_id = %tx_id, error = %e, "validator failed to run; restoring snapshot");
                self.roll_back(snapshot)?;
                return Err(PatchError::Io {
                    key: key.to_string(),
                    stage: IoStage::Validate,
                    reason: e.to_string(),
                });
            }
        };

        if result.passed() {
            self.snapshots.discard(snapshot);
            METRICS.inc_committed();
            obs::emit_transaction_committed(key.as_str(), &tx_id, result.duration_ms);
            return Ok(TransactionOutcome {
                tx_id,
                result,
                committed: true,
                digest_before,
                digest_after: digest_candidate,
            });
        }

        self.roll_back(snapshot)?;
        METRICS.inc_rolled_back();
        obs::emit_transaction_rolled_back(key.as_str(), &tx_id, &result.outcome.to_string());
        Ok(TransactionOutcome {
            tx_id,
            result,
            committed: false,
            digest_after: digest_before.clone(),
            digest_before,
        })
    }

    /// Restore then discard. On restore failure the snapshot (and its
    /// sidecar) is kept for recovery.
    fn roll_back(&self, snapshot: Snapshot) -> Result<()> {
        if let Err(e) = self.snapshots.restore(&snapshot) {
            METRICS.inc_rollback_failures();
            error!(
                key = %snapshot.key,
                tx_id = %snapshot.tx_id,
                error = %e,
                "rollback failed; artifact requires manual intervention"
            );
            obs::emit_rollback_failed(snapshot.key.as_str(), &snapshot.tx_id, &e);
            return Err(e);
        }
        self.snapshots.discard(snapshot);
        Ok(())
    }
}
