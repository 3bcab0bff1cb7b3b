//! Domain models for PatchGuard.
//!
//! Canonical definitions for the core entities:
//! - `Artifact`: the single code unit being mutated and validated
//! - `ValidationResult`: structured outcome of one validator invocation
//! - `RepairSession`: one bounded run of the repair loop and its attempts
//! - `SpecialistReport` / `AggregateVerdict`: review inputs and their consensus

pub mod artifact;
pub mod error;
pub mod report;
pub mod session;
pub mod validation;
pub mod verdict;

pub use artifact::{Artifact, ArtifactKey};
pub use error::{IoStage, PatchError, Result};
pub use report::{Finding, Severity, SpecialistReport};
pub use session::{
    AbortReason, Attempt, ContextNote, FailureClass, RepairSession, SessionStatus,
};
pub use validation::{
    SubCheck, ValidationCommand, ValidationOutcome, ValidationResult,
    DEFAULT_VALIDATION_TIMEOUT_SECS,
};
pub use verdict::{AggregateVerdict, ContributingFinding, Decision, SeverityCounts};
