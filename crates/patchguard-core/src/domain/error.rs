//! Domain-level error taxonomy for PatchGuard.
//!
//! Validation failures are not errors: they travel as
//! [`ValidationResult`](super::ValidationResult) data. Only conditions that
//! must stop automation show up here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use patchguard_memory::MemoryError;

/// Step of a mutation transaction at which artifact I/O failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoStage {
    Capture,
    Write,
    Validate,
}

impl std::fmt::Display for IoStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => write!(f, "capture"),
            Self::Write => write!(f, "write"),
            Self::Validate => write!(f, "validate"),
        }
    }
}

/// PatchGuard errors.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Snapshot capture, candidate write or validator launch failed. The
    /// artifact is still in its pre-transaction state.
    #[error("artifact io failed during {stage} of {key}: {reason}")]
    Io {
        key: String,
        stage: IoStage,
        reason: String,
    },

    /// Restoring the snapshot failed; the artifact content is unknown.
    #[error(
        "rollback of {key} failed in transaction {tx_id}: {reason} (manual intervention required)"
    )]
    RollbackFailed {
        key: String,
        tx_id: Uuid,
        reason: String,
    },

    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    FsIo(#[from] std::io::Error),
}

impl PatchError {
    /// Only a failed rollback leaves the artifact in an unknown state.
    pub fn requires_intervention(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

/// Result type for PatchGuard domain operations.
pub type Result<T> = std::result::Result<T, PatchError>;
