use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use patchguard_memory::{MemoryRecord, MemoryStore};

use crate::domain::{
    AbortReason, ArtifactKey, Attempt, PatchError, RepairSession, SessionStatus,
    ValidationCommand,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::transaction::MutationTransaction;

use super::classify::classify_failure;
use super::context::{note_for, truncate_chars, RepairContext, RECALLED_LEARNINGS};
use super::generator::{CandidateGenerator, CandidateRequest};
use super::policy::{RepairOptions, RepairPolicy};

/// Memory category for learnings recorded by successful sessions.
pub const LEARNING_CATEGORY: &str = "bug_fix";

/// Bounded, strictly sequential repair loop over one artifact.
///
/// Each attempt asks the generator for a candidate and runs it through a
/// [`MutationTransaction`]. The first committed candidate ends the session.
#[derive(Debug, Clone)]
pub struct RepairLoop {
    transaction: MutationTransaction,
    memory: Arc<MemoryStore>,
}

impl RepairLoop {
    pub fn new(transaction: MutationTransaction, memory: Arc<MemoryStore>) -> Self {
        Self {
            transaction,
            memory,
        }
    }

    pub fn transaction(&self) -> &MutationTransaction {
        &self.transaction
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Run until a candidate passes or `max_attempts` (policy default when
    /// `None`) is used up.
    pub async fn debug_until_fixed(
        &self,
        key: &ArtifactKey,
        command: &ValidationCommand,
        generator: &dyn CandidateGenerator,
        max_attempts: Option<u32>,
    ) -> RepairSession {
        let options = RepairOptions {
            max_attempts,
            ..RepairOptions::default()
        };
        self.debug_until_fixed_with(key, command, generator, options)
            .await
    }

    /// Like [`debug_until_fixed`](Self::debug_until_fixed), with cancellation
    /// and a session deadline. Both are checked only between attempts.
    pub async fn debug_until_fixed_with(
        &self,
        key: &ArtifactKey,
        command: &ValidationCommand,
        generator: &dyn CandidateGenerator,
        options: RepairOptions,
    ) -> RepairSession {
        let session = RepairSession::start(key.clone(), command.clone());
        let span = obs::session_span(&session.id, key.as_str());
        self.drive(session, generator, options).instrument(span).await
    }

    async fn drive(
        &self,
        mut session: RepairSession,
        generator: &dyn CandidateGenerator,
        options: RepairOptions,
    ) -> RepairSession {
        let policy = self.load_policy();
        let max_attempts = options.max_attempts.unwrap_or(policy.max_attempts);
        let deadline = options
            .deadline
            .or_else(|| policy.session_timeout())
            .map(|d| Instant::now() + d);
        let key = session.artifact_key.clone();
        let command = session.command.clone();

        obs::emit_session_started(&session.id, key.as_str(), max_attempts);
        let mut context = RepairContext::new(self.recall_learnings());

        for attempt in 1..=max_attempts {
            if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return self.close(session, SessionStatus::Aborted, Some(AbortReason::Cancelled));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return self.close(
                    session,
                    SessionStatus::Aborted,
                    Some(AbortReason::DeadlineExceeded),
                );
            }

            let current = match self.transaction.snapshots().artifact_store().read(&key) {
                Ok(artifact) => artifact.content,
                Err(e) => {
                    let reason = AbortReason::Io {
                        message: format!("reading {key}: {e}"),
                    };
                    return self.close(session, SessionStatus::Aborted, Some(reason));
                }
            };

            let escalate = policy.should_escalate(attempt);
            let request = CandidateRequest {
                artifact_key: key.clone(),
                current_content: current,
                context: context.clone(),
                escalate,
                attempt,
            };
            debug!(attempt, escalate, notes = context.notes.len(), "requesting candidate");

            let candidate = match generator.propose(&request).await {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(attempt, error = %e, "generator produced no candidate");
                    let reason = AbortReason::Generator {
                        message: e.to_string(),
                    };
                    return self.close(session, SessionStatus::Aborted, Some(reason));
                }
            };

            let outcome = match self.transaction.execute(&key, &candidate, &command).await {
                Ok(outcome) => outcome,
                Err(e) => return self.close(session, SessionStatus::Aborted, Some(abort_reason(e))),
            };

            let failure_class = (!outcome.committed).then(|| classify_failure(&outcome.result));
            session.push_attempt(Attempt {
                sequence: attempt,
                candidate: candidate.clone(),
                result: outcome.result.clone(),
                committed: outcome.committed,
                escalated: escalate,
                failure_class,
            });

            if outcome.committed {
                self.record_learning(&mut session, &candidate, attempt, &policy);
                return self.close(session, SessionStatus::Succeeded, None);
            }

            if let Some(class) = failure_class {
                info!(attempt, outcome = %outcome.result.outcome, class = %class, "attempt rolled back");
                if attempt < max_attempts {
                    let note = note_for(attempt, &outcome.result, class);
                    context.push(note.clone());
                    session.push_note(note);
                }
            }
        }

        self.close(session, SessionStatus::Exhausted, None)
    }

    fn load_policy(&self) -> RepairPolicy {
        match self.memory.policy() {
            Ok(snapshot) => RepairPolicy::from_policy(&snapshot),
            Err(e) => {
                warn!(error = %e, "policy unreadable; using repair defaults");
                RepairPolicy::default()
            }
        }
    }

    fn recall_learnings(&self) -> Vec<MemoryRecord> {
        match self.memory.by_category(LEARNING_CATEGORY) {
            Ok(mut records) => {
                let skip = records.len().saturating_sub(RECALLED_LEARNINGS);
                records.split_off(skip)
            }
            Err(e) => {
                warn!(error = %e, "learnings unreadable; starting with empty context");
                Vec::new()
            }
        }
    }

    fn record_learning(
        &self,
        session: &mut RepairSession,
        candidate: &str,
        attempt: u32,
        policy: &RepairPolicy,
    ) {
        let mut description = format!("{} fixed on attempt {attempt}", session.artifact_key);
        if let Some(note) = session.context.last() {
            description.push_str(&format!(" after {} failure", note.failure_class));
        }
        let record = MemoryRecord::new(LEARNING_CATEGORY, description)
            .with_solution(truncate_chars(candidate, policy.learning_excerpt_chars));

        match self.memory.append(record) {
            Ok(entry) => {
                debug!(seq = entry.seq, "learning recorded");
                session.mark_learning_recorded();
            }
            // The fix is already committed; a lost learning does not undo it.
            Err(e) => warn!(error = %e, "failed to record learning"),
        }
    }

    fn close(
        &self,
        mut session: RepairSession,
        status: SessionStatus,
        reason: Option<AbortReason>,
    ) -> RepairSession {
        session.finish(status, reason);
        METRICS.inc_sessions();
        METRICS.flush();
        obs::emit_session_finished(
            &session.id,
            &session.status.to_string(),
            session.attempts.len(),
            session.duration_ms().unwrap_or(0),
        );
        if session.requires_intervention() {
            tracing::error!(
                session_id = %session.id,
                key = %session.artifact_key,
                "session aborted with artifact in unknown state"
            );
        }
        session
    }
}

fn abort_reason(err: PatchError) -> AbortReason {
    let message = err.to_string();
    if err.requires_intervention() {
        AbortReason::RollbackFailed { message }
    } else {
        AbortReason::Io { message }
    }
}
