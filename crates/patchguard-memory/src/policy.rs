//! Standing policy thresholds (`policy.json`).
//!
//! The document is a flat JSON object. Every update rewrites the whole file
//! through a temp file in the same directory and renames it over the old one,
//! so a reader sees either the previous document or the new one.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::MemoryError;
use crate::Result;

/// Well-known policy keys.
pub mod keys {
    /// Repair attempts per session.
    pub const MAX_ATTEMPTS: &str = "max_attempts";
    /// Attempt index from which the generator is told to consult external knowledge.
    pub const ESCALATION_THRESHOLD: &str = "escalation_threshold";
    /// `high` findings that turn an approval into a conditional one.
    pub const MAX_HIGH_FINDINGS: &str = "max_high_findings";
    /// Minimum acceptable quality score on a 0-10 scale.
    pub const MIN_QUALITY_SCORE: &str = "min_quality_score";
    /// Per-specialist timeout during review fan-out.
    pub const SPECIALIST_TIMEOUT_SECS: &str = "specialist_timeout_secs";
    /// Wall-clock ceiling for a whole repair session.
    pub const SESSION_TIMEOUT_SECS: &str = "session_timeout_secs";
    /// Characters of the winning candidate kept in a learning record.
    pub const LEARNING_EXCERPT_CHARS: &str = "learning_excerpt_chars";
}

/// Point-in-time copy of the policy document.
///
/// Consumers take one snapshot at the start of an operation and never watch
/// for live changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicySnapshot {
    values: BTreeMap<String, Value>,
}

impl PolicySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and defaults.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get_u64(key).and_then(|v| u32::try_from(v).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub(crate) fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }
}

/// File-backed policy document.
#[derive(Debug)]
pub struct PolicyDocument {
    path: PathBuf,
    current: PolicySnapshot,
}

impl PolicyDocument {
    /// Load `path`, or start empty when it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let current = if path.exists() {
            let bytes = fs::read(&path)?;
            let value: Value = serde_json::from_slice(&bytes)?;
            if !value.is_object() {
                return Err(MemoryError::InvalidPolicy(format!(
                    "{} does not contain a JSON object",
                    path.display()
                )));
            }
            serde_json::from_value(value)?
        } else {
            PolicySnapshot::default()
        };
        Ok(Self { path, current })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> PolicySnapshot {
        self.current.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.current.get(key).cloned()
    }

    /// Set `key` and persist the whole document atomically.
    ///
    /// The in-memory copy only changes after the rename succeeded.
    pub fn set(&mut self, key: &str, value: Value) -> Result<Option<Value>> {
        let mut next = self.current.clone();
        let previous = next.insert(key.to_string(), value);
        self.persist(&next)?;
        self.current = next;
        Ok(previous)
    }

    fn persist(&self, snapshot: &PolicySnapshot) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(snapshot)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
