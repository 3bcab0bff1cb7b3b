//! PatchGuard Memory: durable learning log and policy store.
//!
//! This crate is the persistence layer for PatchGuard. It records what past
//! repair sessions learned and holds the standing policy thresholds the repair
//! loop and consensus aggregator read at the start of each operation.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: crash safety and insertion order. Nothing here is ever edited in
//! place.
//!
//! ## Key Components
//!
//! - `MemoryStore`: serialized handle over both files below
//! - `LearningLog`: append-only `learnings.jsonl` with a recovery pass
//! - `PolicyDocument`: `policy.json`, replaced atomically on every update
//! - `ContentDigest`: SHA-256 content address shared with the core crate

mod digest;
mod error;
mod log;
pub mod policy;
mod record;
mod store;

pub use digest::ContentDigest;
pub use error::MemoryError;
pub use log::{LearningLog, RecoveryReport};
pub use policy::{PolicyDocument, PolicySnapshot};
pub use record::{LogEntry, MemoryRecord};
pub use store::{MemoryStore, DEFAULT_MEMORY_DIR, MEMORY_HOME_ENV};

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;
