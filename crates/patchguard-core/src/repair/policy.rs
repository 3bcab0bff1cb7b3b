//! Repair loop configuration.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use patchguard_memory::policy::keys;
use patchguard_memory::PolicySnapshot;

/// Repair thresholds, read from the policy store once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPolicy {
    pub max_attempts: u32,
    /// Attempt index from which `escalate` is set.
    pub escalation_threshold: u32,
    /// Wall-clock ceiling for a session; `None` is unbounded.
    pub session_timeout_secs: Option<u64>,
    /// Characters of the winning candidate kept in the learning record.
    pub learning_excerpt_chars: usize,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            escalation_threshold: 2,
            session_timeout_secs: None,
            learning_excerpt_chars: 400,
        }
    }
}

impl RepairPolicy {
    /// Defaults overlaid with whatever keys `policy` sets.
    pub fn from_policy(policy: &PolicySnapshot) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: policy
                .get_u32(keys::MAX_ATTEMPTS)
                .unwrap_or(defaults.max_attempts),
            escalation_threshold: policy
                .get_u32(keys::ESCALATION_THRESHOLD)
                .unwrap_or(defaults.escalation_threshold),
            session_timeout_secs: policy
                .get_u64(keys::SESSION_TIMEOUT_SECS)
                .or(defaults.session_timeout_secs),
            learning_excerpt_chars: policy
                .get_u64(keys::LEARNING_EXCERPT_CHARS)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.learning_excerpt_chars),
        }
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs.map(Duration::from_secs)
    }

    pub fn should_escalate(&self, attempt: u32) -> bool {
        attempt >= self.escalation_threshold
    }
}

/// Cooperative cancellation flag, checked between attempts.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // Only errors if the sender is dropped, which `self` prevents.
        let _ = rx.wait_for(|c| *c).await;
    }
}

/// Per-call overrides for [`RepairLoop::debug_until_fixed_with`](super::RepairLoop::debug_until_fixed_with).
#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    /// Overrides the policy's `max_attempts`.
    pub max_attempts: Option<u32>,
    pub cancel: Option<CancelHandle>,
    /// Overrides the policy's session timeout.
    pub deadline: Option<Duration>,
}

impl RepairOptions {
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
