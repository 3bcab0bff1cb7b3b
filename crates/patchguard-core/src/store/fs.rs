use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use patchguard_memory::ContentDigest;

use super::{ArtifactStore, Result, StoreError};
use crate::domain::{Artifact, ArtifactKey};

/// Filesystem-backed artifact store.
///
/// Layout: `<root>/<key>`. Writes go to a temp file in the target's directory
/// and are renamed over the old file.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        key.to_path(&self.root)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read(&self, key: &ArtifactKey) -> Result<Artifact> {
        let path = self.path_of(key);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        let content =
            String::from_utf8(bytes).map_err(|_| StoreError::InvalidUtf8(key.to_string()))?;
        Ok(Artifact::new(key.clone(), content))
    }

    fn write(&self, key: &ArtifactKey, content: &str) -> Result<ContentDigest> {
        let path = self.path_of(key);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        Ok(ContentDigest::from_bytes(content.as_bytes()))
    }
}
