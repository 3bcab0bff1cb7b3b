//! Bounded iterative repair.
//!
//! [`RepairLoop`] drives a [`CandidateGenerator`] through repeated
//! [`MutationTransaction`](crate::transaction::MutationTransaction)s until a
//! candidate passes validation, the attempt budget runs out, or the session
//! is cancelled. Every failed attempt leaves a [`ContextNote`](crate::domain::ContextNote)
//! for the next one; a successful session leaves a learning in memory.

pub mod classify;
pub mod context;
pub mod engine;
pub mod generator;
pub mod policy;

pub use classify::classify_failure;
pub use context::{error_excerpt, note_for, RepairContext};
pub use engine::{RepairLoop, LEARNING_CATEGORY};
pub use generator::{CandidateGenerator, CandidateRequest, GeneratorError};
pub use policy::{CancelHandle, RepairOptions, RepairPolicy};
