//! Structured lifecycle events for repair sessions, transactions and reviews.
//!
//! Events are emitted at `info!` (failures at `warn!`/`error!`) with an
//! `event` field naming the lifecycle step, so JSON logs can be filtered on
//! it directly.

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::Decision;

/// Span carrying `session_id` and `key`, for use with `tracing::Instrument`.
pub fn session_span(session_id: &Uuid, key: &str) -> tracing::Span {
    tracing::info_span!("patchguard.session", session_id = %session_id, key = %key)
}

pub fn emit_session_started(session_id: &Uuid, key: &str, max_attempts: u32) {
    info!(
        event = "session.started",
        session_id = %session_id,
        key = %key,
        max_attempts = max_attempts,
    );
}

pub fn emit_session_finished(session_id: &Uuid, status: &str, attempts: usize, duration_ms: u64) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        status = %status,
        attempts = attempts,
        duration_ms = duration_ms,
    );
}

pub fn emit_transaction_committed(key: &str, tx_id: &Uuid, duration_ms: u64) {
    info!(
        event = "transaction.committed",
        key = %key,
        tx_id = %tx_id,
        validation_ms = duration_ms,
    );
}

pub fn emit_transaction_rolled_back(key: &str, tx_id: &Uuid, outcome: &str) {
    info!(
        event = "transaction.rolled_back",
        key = %key,
        tx_id = %tx_id,
        outcome = %outcome,
    );
}

/// The artifact may be in an unknown state.
pub fn emit_rollback_failed(key: &str, tx_id: &Uuid, error: &dyn std::fmt::Display) {
    error!(event = "rollback.failed", key = %key, tx_id = %tx_id, error = %error);
}

pub fn emit_verdict_evaluated(decision: Decision, reports: usize, findings: usize) {
    info!(
        event = "verdict.evaluated",
        decision = %decision,
        reports = reports,
        findings = findings,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_span_create() {
        let span = session_span(&Uuid::new_v4(), "app.py");
        let _entered = span.enter();
    }
}
