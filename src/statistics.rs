//! Per-DAP-id breakpoint statistics (§4.7).
//!
//! No teacher counterpart exists (`trust-debug` has no telemetry layer for
//! its breakpoints); grounded on the small struct-plus-`parking_lot::Mutex`
//! pattern used throughout `trust-lsp` for shared counters.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// `{set, verified, hit}` for one DAP breakpoint id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakpointStats {
    pub set: bool,
    pub verified: bool,
    pub hit: bool,
}

/// Aggregate counts across every breakpoint the manager has ever seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub set: u32,
    pub verified: u32,
    pub hit: u32,
}

#[derive(Debug, Default)]
pub struct Statistics {
    by_id: Mutex<FxHashMap<u32, BreakpointStats>>,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a breakpoint id on `setBreakpoints` acceptance.
    pub fn register(&self, dap_id: u32) {
        self.by_id.lock().entry(dap_id).or_default().set = true;
    }

    pub fn forget(&self, dap_id: u32) {
        self.by_id.lock().remove(&dap_id);
    }

    /// Called on an `updateUiLocations` transition.
    pub fn mark_verified(&self, dap_id: u32, verified: bool) {
        if let Some(entry) = self.by_id.lock().get_mut(&dap_id) {
            entry.verified = verified;
        }
    }

    /// Called when the pause classifier attributes a pause to this id.
    pub fn mark_hit(&self, dap_id: u32) {
        if let Some(entry) = self.by_id.lock().get_mut(&dap_id) {
            entry.hit = true;
        }
    }

    #[must_use]
    pub fn get(&self, dap_id: u32) -> BreakpointStats {
        self.by_id.lock().get(&dap_id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn aggregate(&self) -> AggregateStats {
        let by_id = self.by_id.lock();
        let mut agg = AggregateStats::default();
        for stats in by_id.values() {
            if stats.set {
                agg.set += 1;
            }
            if stats.verified {
                agg.verified += 1;
            }
            if stats.hit {
                agg.hit += 1;
            }
        }
        agg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_aggregate() {
        let stats = Statistics::new();
        stats.register(1);
        stats.register(2);
        stats.mark_verified(1, true);
        stats.mark_hit(1);

        let agg = stats.aggregate();
        assert_eq!(agg.set, 2);
        assert_eq!(agg.verified, 1);
        assert_eq!(agg.hit, 1);
    }

    #[test]
    fn forget_removes_entry() {
        let stats = Statistics::new();
        stats.register(1);
        stats.forget(1);
        assert_eq!(stats.get(1), BreakpointStats::default());
    }
}
