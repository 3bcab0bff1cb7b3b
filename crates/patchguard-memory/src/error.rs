//! Error types for patchguard-memory

use thiserror::Error;

/// Errors that can occur in the memory persistence layer
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Filesystem error while reading or writing a memory file
    #[error("memory io failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("memory serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record before the log tail is unreadable; recovery refuses to guess
    #[error("learning log corrupt at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// The policy document is not a JSON object
    #[error("policy document invalid: {0}")]
    InvalidPolicy(String),

    /// Another caller panicked while holding the store lock
    #[error("memory store lock poisoned")]
    Poisoned,
}
