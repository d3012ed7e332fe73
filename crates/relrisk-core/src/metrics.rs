//! Process-wide assessment counters.
//!
//! Incremented at the call site; [`Metrics::flush`] emits the current values
//! as a single `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Atomic counters. No allocation, no locking.
pub struct Metrics {
    assessments_started: AtomicU64,
    assessments_completed: AtomicU64,
    assessments_failed: AtomicU64,
    model_attempts: AtomicU64,
    parse_failures: AtomicU64,
    policy_overrides: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            assessments_started: AtomicU64::new(0),
            assessments_completed: AtomicU64::new(0),
            assessments_failed: AtomicU64::new(0),
            model_attempts: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            policy_overrides: AtomicU64::new(0),
        }
    }

    pub fn inc_started(&self) {
        self.assessments_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "assessments_started", "counter incremented");
    }

    pub fn inc_completed(&self) {
        self.assessments_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "assessments_completed", "counter incremented");
    }

    pub fn inc_failed(&self) {
        self.assessments_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "assessments_failed", "counter incremented");
    }

    /// One model call, successful or not.
    pub fn inc_model_attempts(&self) {
        self.model_attempts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "model_attempts", "counter incremented");
    }

    pub fn inc_parse_failures(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "parse_failures", "counter incremented");
    }

    /// Policy turned a model GO into NO_GO.
    pub fn inc_policy_overrides(&self) {
        self.policy_overrides.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "policy_overrides", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            assessments_started = self.assessments_started(),
            assessments_completed = self.assessments_completed(),
            assessments_failed = self.assessments_failed(),
            model_attempts = self.model_attempts(),
            parse_failures = self.parse_failures(),
            policy_overrides = self.policy_overrides(),
        );
    }

    pub fn assessments_started(&self) -> u64 {
        self.assessments_started.load(Ordering::Relaxed)
    }

    pub fn assessments_completed(&self) -> u64 {
        self.assessments_completed.load(Ordering::Relaxed)
    }

    pub fn assessments_failed(&self) -> u64 {
        self.assessments_failed.load(Ordering::Relaxed)
    }

    pub fn model_attempts(&self) -> u64 {
        self.model_attempts.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn policy_overrides(&self) -> u64 {
        self.policy_overrides.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.assessments_started.store(0, Ordering::Relaxed);
        self.assessments_completed.store(0, Ordering::Relaxed);
        self.assessments_failed.store(0, Ordering::Relaxed);
        self.model_attempts.store(0, Ordering::Relaxed);
        self.parse_failures.store(0, Ordering::Relaxed);
        self.policy_overrides.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_started();
        m.inc_started();
        m.inc_model_attempts();
        m.inc_parse_failures();
        m.inc_policy_overrides();
        m.inc_completed();
        assert_eq!(m.assessments_started(), 2);
        assert_eq!(m.model_attempts(), 1);
        assert_eq!(m.parse_failures(), 1);
        assert_eq!(m.policy_overrides(), 1);
        assert_eq!(m.assessments_completed(), 1);
        assert_eq!(m.assessments_failed(), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_started();
        m.inc_failed();
        m.inc_model_attempts();
        m.reset();
        assert_eq!(m.assessments_started(), 0);
        assert_eq!(m.assessments_failed(), 0);
        assert_eq!(m.model_attempts(), 0);
    }
}
