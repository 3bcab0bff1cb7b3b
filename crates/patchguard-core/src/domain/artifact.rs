//! Artifact identity and content.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use patchguard_memory::ContentDigest;

use super::error::{PatchError, Result};

/// Relative path identifying one artifact inside an artifact store.
///
/// Keys never escape the store root: absolute paths and `..` components are
/// rejected at construction. Keys are canonical, so `./app.py`,
/// `src//app.py` and `app.py/` name the same artifact as their plain form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(PatchError::InvalidKey("key must not be empty".to_string()));
        }
        let mut segments = Vec::new();
        for component in Path::new(&key).components() {
            match component {
                Component::Normal(segment) => match segment.to_str() {
                    Some(segment) => segments.push(segment),
                    None => {
                        return Err(PatchError::InvalidKey(format!("{key} is not valid UTF-8")))
                    }
                },
                Component::CurDir => {}
                _ => {
                    return Err(PatchError::InvalidKey(format!(
                        "{key} must be a relative path inside the store"
                    )))
                }
            }
        }
        if segments.is_empty() {
            return Err(PatchError::InvalidKey(format!("{key} names no file")));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against a store root.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = PatchError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ArtifactKey> for String {
    fn from(k: ArtifactKey) -> Self {
        k.0
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An artifact's content at one point in time, with its checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub key: ArtifactKey,
    pub content: String,
    pub digest: ContentDigest,
}

impl Artifact {
    pub fn new(key: ArtifactKey, content: impl Into<String>) -> Self {
        let content = content.into();
        let digest = ContentDigest::from_bytes(content.as_bytes());
        Self {
            key,
            content,
            digest,
        }
    }
}
