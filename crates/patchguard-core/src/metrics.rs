//! Global atomic counters for PatchGuard.
//!
//! Counters are bumped silently at the call site. Call [`Metrics::flush`] at
//! a natural boundary (end of a session, end of a review) to emit the current
//! values as one `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    rollback_failures: AtomicU64,
    sessions_finished: AtomicU64,
    verdicts_evaluated: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            transactions_committed: AtomicU64::new(0),
            transactions_rolled_back: AtomicU64::new(0),
            rollback_failures: AtomicU64::new(0),
            sessions_finished: AtomicU64::new(0),
            verdicts_evaluated: AtomicU64::new(0),
        }
    }

    pub fn inc_committed(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "transactions_committed", "counter incremented");
    }

    pub fn inc_rolled_back(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "transactions_rolled_back", "counter incremented");
    }

    pub fn inc_rollback_failures(&self) {
        self.rollback_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rollback_failures", "counter incremented");
    }

    pub fn inc_sessions(&self) {
        self.sessions_finished.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_finished", "counter incremented");
    }

    pub fn inc_verdicts(&self) {
        self.verdicts_evaluated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "verdicts_evaluated", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            transactions_committed = self.transactions_committed(),
            transactions_rolled_back = self.transactions_rolled_back(),
            rollback_failures = self.rollback_failures(),
            sessions_finished = self.sessions_finished(),
            verdicts_evaluated = self.verdicts_evaluated(),
        );
    }

    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    pub fn transactions_rolled_back(&self) -> u64 {
        self.transactions_rolled_back.load(Ordering::Relaxed)
    }

    pub fn rollback_failures(&self) -> u64 {
        self.rollback_failures.load(Ordering::Relaxed)
    }

    pub fn sessions_finished(&self) -> u64 {
        self.sessions_finished.load(Ordering::Relaxed)
    }

    pub fn verdicts_evaluated(&self) -> u64 {
        self.verdicts_evaluated.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.transactions_committed.store(0, Ordering::Relaxed);
        self.transactions_rolled_back.store(0, Ordering::Relaxed);
        self.rollback_failures.store(0, Ordering::Relaxed);
        self.sessions_finished.store(0, Ordering::Relaxed);
        self.verdicts_evaluated.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_committed();
        m.inc_committed();
        m.inc_rolled_back();
        m.inc_rollback_failures();
        m.inc_sessions();
        m.inc_verdicts();
        m.inc_verdicts();
        m.inc_verdicts();
        assert_eq!(m.transactions_committed(), 2);
        assert_eq!(m.transactions_rolled_back(), 1);
        assert_eq!(m.rollback_failures(), 1);
        assert_eq!(m.sessions_finished(), 1);
        assert_eq!(m.verdicts_evaluated(), 3);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_committed();
        m.inc_rolled_back();
        m.inc_verdicts();
        m.reset();
        assert_eq!(m.transactions_committed(), 0);
        assert_eq!(m.transactions_rolled_back(), 0);
        assert_eq!(m.verdicts_evaluated(), 0);
    }
}
