//! Ambient tunables for the breakpoint coordination core.
//!
//! Grouped into one `Default`-able struct the embedding adapter constructs
//! once and hands to [`crate::manager::BreakpointManager::new`], mirroring
//! `trust-lsp`'s `SourceOptions`/`SourceOptionsUpdate` plain-data-plus-
//! explicit-update pattern rather than scattering tunables as global state.

use std::time::Duration;

use crate::breakpoint::EntryBreakpointMode;

/// Configuration for one `BreakpointManager` instance.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// §4.3.3: whether Entry breakpoints install by exact path or by a
    /// basename-derived URL regex.
    pub entry_breakpoint_mode: EntryBreakpointMode,

    /// §4.5: per-script budget for a source-map handler wait.
    pub source_map_min_pause: Duration,

    /// §4.5: cumulative budget across all scripts in one session.
    pub source_map_cumulative_pause: Duration,

    /// §4.4.1 step 8: bound on `enable` before it is raced against a
    /// timeout so IDE launch does not block indefinitely.
    pub enable_timeout: Duration,

    /// §4.6: bound on waiting for `setCompleted` deferreds before the
    /// classifier surfaces a `stopped` event anyway.
    pub resolve_before_stopped_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            entry_breakpoint_mode: EntryBreakpointMode::Exact,
            source_map_min_pause: Duration::from_millis(1000),
            source_map_cumulative_pause: Duration::from_millis(10_000),
            enable_timeout: Duration::from_millis(500),
            resolve_before_stopped_timeout: Duration::from_millis(1000),
        }
    }
}
