//! Artifact storage seam.
//!
//! The mutation pipeline only ever reads and replaces whole artifacts, so the
//! interface is two calls. [`FsArtifactStore`] is the production backend;
//! [`MemoryArtifactStore`] is an in-process fake with fault injection.

pub mod fs;
pub mod memory;

use thiserror::Error;

use patchguard_memory::ContentDigest;

use crate::domain::{Artifact, ArtifactKey};

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

/// Errors from artifact stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Whole-artifact read/replace interface.
pub trait ArtifactStore: Send + Sync {
    /// Read the current content of `key`.
    fn read(&self, key: &ArtifactKey) -> Result<Artifact>;

    /// Replace the content of `key`. A write is never observable half-done.
    fn write(&self, key: &ArtifactKey, content: &str) -> Result<ContentDigest>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for std::sync::Arc<S> {
    fn read(&self, key: &ArtifactKey) -> Result<Artifact> {
        (**self).read(key)
    }

    fn write(&self, key: &ArtifactKey, content: &str) -> Result<ContentDigest> {
        (**self).write(key, content)
    }
}
