//! PatchGuard Core Library
//!
//! Transactional code mutation with validation-gated commits, a bounded
//! repair loop on top of it, and a consensus layer that merges independent
//! review reports into one verdict.
//!
//! ## Layer 1 - Domain & Orchestration
//!
//! - `transaction`: snapshot → write → validate → commit or roll back
//! - `repair`: `RepairLoop::debug_until_fixed`
//! - `consensus`: specialist fan-out and `aggregate`
//! - `reporting`: digest-verified session and verdict artifacts

pub mod consensus;
pub mod domain;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod repair;
pub mod reporting;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod transaction;
pub mod validator;

/// Crate version, kept in lockstep across the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use consensus::{
    aggregate, gather_reports, render_verdict_md, review, ConsensusPolicy, FanIn, FanOutConfig,
    SpecialistSource,
};

pub use domain::{
    AbortReason, AggregateVerdict, Artifact, ArtifactKey, Attempt, ContextNote,
    ContributingFinding, Decision, FailureClass, Finding, IoStage, PatchError, RepairSession,
    Result, SessionStatus, Severity, SeverityCounts, SpecialistReport, SubCheck,
    ValidationCommand, ValidationOutcome, ValidationResult,
};

pub use repair::{
    classify_failure, CancelHandle, CandidateGenerator, CandidateRequest, GeneratorError,
    RepairContext, RepairLoop, RepairOptions, RepairPolicy,
};

pub use reporting::{
    read_session_artifact, read_verdict_artifact, write_session_artifact, write_verdict_artifact,
};

pub use snapshot::{Snapshot, SnapshotStore};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, StoreError};
pub use transaction::{ArtifactLocks, MutationTransaction, TransactionOutcome};
pub use validator::{Validator, ValidatorError};

pub use patchguard_memory::{
    policy::keys as policy_keys, ContentDigest, MemoryError, MemoryRecord, MemoryStore,
    PolicySnapshot,
};
