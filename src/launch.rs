//! Launch-blocker aggregator (§4.4.1 step 8, GLOSSARY "Launch blocker").
//!
//! No teacher counterpart exists; grounded on the same small
//! struct-plus-mutex pattern as [`crate::statistics`]. Each call to `enable`
//! made while accepting a `setBreakpoints` is raced against
//! [`crate::config::ManagerConfig::enable_timeout`] so a slow or wedged
//! runtime cannot block IDE launch indefinitely; the outcome of that race
//! is recorded here rather than as a detached background promise, since
//! this crate has no 'static executor to hand a spawned task to.

use parking_lot::Mutex;

/// Outcome of racing one breakpoint's `enable` against the enable-timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchBlockerOutcome {
    Settled,
    TimedOut,
}

#[derive(Debug, Default)]
pub struct LaunchBlockers {
    outcomes: Mutex<Vec<LaunchBlockerOutcome>>,
}

impl LaunchBlockers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: LaunchBlockerOutcome) {
        self.outcomes.lock().push(outcome);
    }

    /// True iff every blocker settled before its timeout. The IDE is not
    /// required to wait on this to declare launch complete, but the
    /// embedding adapter can surface it for diagnostics.
    #[must_use]
    pub fn all_settled(&self) -> bool {
        self.outcomes.lock().iter().all(|o| matches!(o, LaunchBlockerOutcome::Settled))
    }

    #[must_use]
    pub fn timed_out_count(&self) -> usize {
        self.outcomes
            .lock()
            .iter()
            .filter(|o| matches!(o, LaunchBlockerOutcome::TimedOut))
            .count()
    }

    pub fn clear(&self) {
        self.outcomes.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_settled_is_true_when_empty_and_when_all_settle() {
        let blockers = LaunchBlockers::new();
        assert!(blockers.all_settled());
        blockers.record(LaunchBlockerOutcome::Settled);
        assert!(blockers.all_settled());
    }

    #[test]
    fn one_timeout_flips_all_settled() {
        let blockers = LaunchBlockers::new();
        blockers.record(LaunchBlockerOutcome::Settled);
        blockers.record(LaunchBlockerOutcome::TimedOut);
        assert!(!blockers.all_settled());
        assert_eq!(blockers.timed_out_count(), 1);
    }
}
