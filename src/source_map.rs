//! Source-map-handler coordinator (§4.5).
//!
//! No direct teacher counterpart — `trust-debug`'s language has no source
//! maps — grounded on the *shape* of
//! `trust-debug::session::DebugSession::reload_program`/`revalidate_breakpoints`
//! (re-resolve previously-requested breakpoints against newly available
//! information), generalized from "file reload" to "new compiled script
//! arrives."
//!
//! This module owns only the instrumentation-breakpoint bookkeeping and the
//! timeout budgets; the "walk sources, find matching breakpoints, call
//! `update_for_new_locations`" logic lives in [`crate::manager`], which is
//! where the breakpoint registry already lives (§3 "Ownership": the
//! coordinator borrows, never retains).

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::time::Instant;

use crate::error::BreakpointError;
use crate::peers::CdpClient;
use crate::protocol::{CdpBreakpointId, ScriptId};

/// The fixed WASM instrumentation pattern (Open Question (b): retained
/// defensively even though it is not known to have effect on every engine).
const WASM_URL_REGEX: &str = r"\.wasm$";

const INSTRUMENTATION_KIND: &str = "beforeScriptWithSourceMapExecution";

pub struct SourceMapCoordinator {
    instrumentation_id: Option<CdpBreakpointId>,
    wasm_id: Option<CdpBreakpointId>,
    handled_scripts: Mutex<FxHashSet<ScriptId>>,
    cumulative_remaining: Mutex<Duration>,
    min_pause: Duration,
}

impl SourceMapCoordinator {
    #[must_use]
    pub fn new(min_pause: Duration, cumulative_pause: Duration) -> Self {
        Self {
            instrumentation_id: None,
            wasm_id: None,
            handled_scripts: Mutex::new(FxHashSet::default()),
            cumulative_remaining: Mutex::new(cumulative_pause),
            min_pause,
        }
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.instrumentation_id.is_some()
    }

    /// Installs the instrumentation breakpoint plus the WASM regex
    /// breakpoint. Idempotent: a second call while already installed is a
    /// no-op.
    pub async fn install<C: CdpClient>(&mut self, cdp: &C) -> Result<bool, BreakpointError> {
        if self.instrumentation_id.is_some() {
            return Ok(true);
        }

        let instrumentation_id = cdp.set_instrumentation_breakpoint(INSTRUMENTATION_KIND).await?;
        self.instrumentation_id = Some(instrumentation_id);

        match cdp
            .set_breakpoint_by_url(crate::peers::SetBreakpointByUrlParams {
                url: None,
                url_regex: Some(WASM_URL_REGEX.to_string()),
                line_number: 0,
                column_number: 0,
                condition: None,
            })
            .await
        {
            Ok(result) => self.wasm_id = Some(result.breakpoint_id),
            Err(err) => {
                tracing::debug!(error = %err, "wasm instrumentation regex breakpoint not installed");
            }
        }

        Ok(true)
    }

    pub async fn uninstall<C: CdpClient>(&mut self, cdp: &C) {
        if let Some(id) = self.instrumentation_id.take() {
            if let Err(err) = cdp.remove_breakpoint(&id).await {
                tracing::warn!(error = %err, "failed to remove instrumentation breakpoint");
            }
        }
        if let Some(id) = self.wasm_id.take() {
            if let Err(err) = cdp.remove_breakpoint(&id).await {
                tracing::warn!(error = %err, "failed to remove wasm instrumentation breakpoint");
            }
        }
        self.handled_scripts.lock().clear();
    }

    #[must_use]
    pub fn entry_breakpoint_ids(&self) -> (Option<&CdpBreakpointId>, Option<&CdpBreakpointId>) {
        (self.instrumentation_id.as_ref(), self.wasm_id.as_ref())
    }

    /// Per-script memoization (O3): returns `true` the first time it is
    /// called for a given script id, `false` on every later call.
    #[must_use]
    pub fn claim_script(&self, script_id: &ScriptId) -> bool {
        self.handled_scripts.lock().insert(script_id.clone())
    }

    /// Runs `work`, bounded by `min(min_pause, remaining cumulative
    /// budget)`. On success, decrements the cumulative budget by the actual
    /// elapsed time. On timeout, decrements it by the budget consumed and
    /// returns `SourceMapTimeout`.
    pub async fn run_budgeted<Fut, T>(&self, work: Fut) -> Result<T, BreakpointError>
    where
        Fut: Future<Output = T>,
    {
        let budget = {
            let remaining = self.cumulative_remaining.lock();
            self.min_pause.min(*remaining)
        };

        let started = Instant::now();
        match tokio::time::timeout(budget, work).await {
            Ok(value) => {
                let elapsed = started.elapsed();
                let mut remaining = self.cumulative_remaining.lock();
                *remaining = remaining.saturating_sub(elapsed);
                Ok(value)
            }
            Err(_) => {
                let mut remaining = self.cumulative_remaining.lock();
                *remaining = remaining.saturating_sub(budget);
                Err(BreakpointError::SourceMapTimeout {
                    elapsed_ms: budget.as_millis() as u64,
                })
            }
        }
    }

    #[must_use]
    pub fn cumulative_remaining(&self) -> Duration {
        *self.cumulative_remaining.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_script_is_one_shot() {
        let coordinator = SourceMapCoordinator::new(Duration::from_millis(100), Duration::from_secs(1));
        let id = ScriptId("S1".to_string());
        assert!(coordinator.claim_script(&id));
        assert!(!coordinator.claim_script(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn run_budgeted_times_out_and_decrements_cumulative() {
        let coordinator = SourceMapCoordinator::new(Duration::from_millis(100), Duration::from_millis(1000));
        let result = coordinator
            .run_budgeted(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
            })
            .await;
        assert!(matches!(result, Err(BreakpointError::SourceMapTimeout { elapsed_ms: 100 })));
        assert_eq!(coordinator.cumulative_remaining(), Duration::from_millis(900));
    }

    #[tokio::test]
    async fn run_budgeted_succeeds_under_budget() {
        let coordinator = SourceMapCoordinator::new(Duration::from_millis(100), Duration::from_millis(1000));
        let result = coordinator.run_budgeted(async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
