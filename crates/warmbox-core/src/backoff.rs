//! Failure gate for proactive provisioning.
//!
//! One unreachable or resource-exhausted engine must not trigger a retry
//! storm. After any creation failure the gate closes for `window`; the next
//! successful creation reopens it immediately. Past `quick_fail_threshold`
//! consecutive failures, on-demand provisioning is quick-failed as well.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct FailureRecord {
    last_failure: Option<Instant>,
    consecutive: u32,
}

/// Tracks creation failures and gates proactive provisioning.
pub(crate) struct BackoffController {
    window: Duration,
    quick_fail_threshold: u32,
    record: Mutex<FailureRecord>,
}

impl BackoffController {
    pub(crate) fn new(window: Duration, quick_fail_threshold: u32) -> Self {
        Self {
            window,
            quick_fail_threshold,
            record: Mutex::new(FailureRecord::default()),
        }
    }

    fn record(&self) -> MutexGuard<'_, FailureRecord> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether proactive provisioning may start a new attempt.
    pub(crate) fn permit_attempt(&self) -> bool {
        match self.record().last_failure {
            Some(at) => at.elapsed() >= self.window,
            None => true,
        }
    }

    /// Whether the on-demand path should quick-fail instead of calling the
    /// engine.
    pub(crate) fn quick_fail(&self) -> bool {
        self.record().consecutive > self.quick_fail_threshold
    }

    /// Reset the gate after a successful creation.
    pub(crate) fn record_success(&self) {
        let mut record = self.record();
        if record.last_failure.is_some() || record.consecutive > 0 {
            tracing::info!("Creation succeeded, backoff cleared");
        }
        record.last_failure = None;
        record.consecutive = 0;
    }

    /// Note a failed creation, closing the gate for the window.
    pub(crate) fn record_failure(&self) {
        let mut record = self.record();
        if record.last_failure.is_none() {
            tracing::warn!(window = ?self.window, "Creation failed, backoff engaged");
        }
        record.last_failure = Some(Instant::now());
        record.consecutive += 1;
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.record().consecutive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits_initially() {
        let backoff = BackoffController::new(Duration::from_secs(300), 3);
        assert!(backoff.permit_attempt());
        assert!(!backoff.quick_fail());
        assert_eq!(backoff.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_closes_gate_for_window() {
        let backoff = BackoffController::new(Duration::from_secs(300), 3);
        backoff.record_failure();
        assert!(!backoff.permit_attempt());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!backoff.permit_attempt());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(backoff.permit_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_gate_immediately() {
        let backoff = BackoffController::new(Duration::from_secs(300), 3);
        backoff.record_failure();
        backoff.record_failure();
        assert!(!backoff.permit_attempt());
        assert_eq!(backoff.consecutive_failures(), 2);

        backoff.record_success();
        assert!(backoff.permit_attempt());
        assert_eq!(backoff.consecutive_failures(), 0);
    }

    #[test]
    fn test_quick_fail_past_threshold() {
        let backoff = BackoffController::new(Duration::from_secs(300), 3);
        for _ in 0..3 {
            backoff.record_failure();
        }
        // At the threshold, still attempted.
        assert!(!backoff.quick_fail());

        backoff.record_failure();
        assert!(backoff.quick_fail());

        backoff.record_success();
        assert!(!backoff.quick_fail());
    }
}
