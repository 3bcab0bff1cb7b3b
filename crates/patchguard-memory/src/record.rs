//! Learning record schema as persisted in `learnings.jsonl`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::Result;

/// One learning recorded after a successful repair.
///
/// Records are append-only: once written they are never edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Kind of learning (`bug_fix`, `pattern`, `refactoring`, ...).
    pub category: String,
    /// What was learned.
    pub description: String,
    /// How it was resolved, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            solution: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }
}

/// A sealed log line: sequence number, digest of the record body, record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub digest: ContentDigest,
    pub record: MemoryRecord,
}

impl LogEntry {
    /// Seal `record` at position `seq`.
    pub fn seal(seq: u64, record: MemoryRecord) -> Result<Self> {
        let body = serde_json::to_vec(&record)?;
        Ok(Self {
            seq,
            digest: ContentDigest::from_bytes(&body),
            record,
        })
    }

    /// Whether the stored digest still matches the record body.
    pub fn verify(&self) -> bool {
        match serde_json::to_vec(&self.record) {
            Ok(body) => ContentDigest::from_bytes(&body) == self.digest,
            Err(_) => false,
        }
    }
}
