//! Repair session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::ArtifactKey;
use super::validation::{ValidationCommand, ValidationOutcome, ValidationResult};

/// Terminal (or running) state of a repair session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Succeeded,
    Exhausted,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Why a session was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// The candidate generator reported an error.
    Generator { message: String },
    /// Artifact capture, write or validator launch failed.
    Io { message: String },
    /// The snapshot could not be restored. The artifact needs manual attention.
    RollbackFailed { message: String },
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generator { message } => write!(f, "generator: {message}"),
            Self::Io { message } => write!(f, "io: {message}"),
            Self::RollbackFailed { message } => write!(f, "rollback_failed: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Coarse classification of a failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Assertion,
    Import,
    Type,
    Attribute,
    Value,
    Runtime,
    Timeout,
    Unknown,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assertion => "assertion",
            Self::Import => "import",
            Self::Type => "type",
            Self::Attribute => "attribute",
            Self::Value => "value",
            Self::Runtime => "runtime",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure context carried from one attempt to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNote {
    pub attempt: u32,
    pub outcome: ValidationOutcome,
    #[serde(default)]
    pub failing_checks: Vec<String>,
    pub error_excerpt: String,
    pub failure_class: FailureClass,
}

/// One candidate tried by the repair loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based.
    pub sequence: u32,
    pub candidate: String,
    pub result: ValidationResult,
    pub committed: bool,
    /// Whether the generator was asked to consult external knowledge.
    pub escalated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_class: Option<FailureClass>,
}

/// A bounded run of the repair loop against one artifact.
///
/// Once the status is terminal the record is frozen: later mutation attempts
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSession {
    pub id: Uuid,
    pub artifact_key: ArtifactKey,
    pub command: ValidationCommand,
    pub attempts: Vec<Attempt>,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    #[serde(default)]
    pub context: Vec<ContextNote>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub learning_recorded: bool,
}

impl RepairSession {
    pub fn start(artifact_key: ArtifactKey, command: ValidationCommand) -> Self {
        Self {
            id: Uuid::new_v4(),
            artifact_key,
            command,
            attempts: Vec::new(),
            status: SessionStatus::Running,
            abort_reason: None,
            context: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            learning_recorded: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True only when a rollback failed and the artifact state is unknown.
    pub fn requires_intervention(&self) -> bool {
        matches!(self.abort_reason, Some(AbortReason::RollbackFailed { .. }))
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// The attempt that was committed, if the session succeeded.
    pub fn winning_attempt(&self) -> Option<&Attempt> {
        self.attempts.iter().find(|a| a.committed)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }

    pub(crate) fn push_attempt(&mut self, attempt: Attempt) {
        if self.frozen("attempt") {
            return;
        }
        self.attempts.push(attempt);
    }

    pub(crate) fn push_note(&mut self, note: ContextNote) {
        if self.frozen("context note") {
            return;
        }
        self.context.push(note);
    }

    pub(crate) fn mark_learning_recorded(&mut self) {
        // Set during finalization, just before the status becomes terminal.
        if self.frozen("learning flag") {
            return;
        }
        self.learning_recorded = true;
    }

    pub(crate) fn finish(&mut self, status: SessionStatus, reason: Option<AbortReason>) {
        if self.frozen("status") || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.abort_reason = reason;
        self.finished_at = Some(Utc::now());
    }

    fn frozen(&self, what: &str) -> bool {
        if self.is_terminal() {
            tracing::warn!(session_id = %self.id, what, "ignoring change to terminated session");
            true
        } else {
            false
        }
    }
}
