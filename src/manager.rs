//! Breakpoint manager (§4.4): the top-level store keyed by path and by
//! source reference, orchestrating `setBreakpoints`, pause-vote counting,
//! breakpoint moves across a source-map rewrite, and the enabled-filter
//! overlay.
//!
//! Grounded on `trust-debug::session::BreakpointManager` (diff-on-
//! `setBreakpoints`, a map from source key to an ordered breakpoint list,
//! a report string) for its top-level shape; the diff/match-by-equivalence
//! algorithm, the launch-blocker race, and the `resolvedById` registry are
//! new; the teacher has no concept of provisional vs. verified breakpoints
//! across multiple installations, since its runtime is in-process and
//! synchronous.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::breakpoint::{normalize_path, Breakpoint, BreakpointKind, EntryBreakpointMode, RequestKey, SourceKey};
use crate::config::ManagerConfig;
use crate::error::BreakpointError;
use crate::launch::{LaunchBlockerOutcome, LaunchBlockers};
use crate::pause::{self, PauseInputs, PauseVerdict};
use crate::peers::{CdpClient, Predictor, SourceContainer, UiLocation};
use crate::protocol::{CdpBreakpointId, CdpLocation, DapBreakpoint, OutputEventBody, ScriptId, ScriptInfo, Source, SetBreakpointsArguments};
use crate::source_map::SourceMapCoordinator;
use crate::statistics::Statistics;

/// Non-owning `cdpBreakpointId → DAP id` registry (§9 "Cyclic references"):
/// breakpoints never hold a back-pointer to the manager; event routing code
/// is instead handed this registry to resolve `breakpointResolved`/`paused`
/// events back to an owning id, while the manager remains the sole owner
/// of the breakpoints themselves.
#[derive(Default)]
pub struct ResolverRegistry {
    map: Mutex<FxHashMap<CdpBreakpointId, u32>>,
}

impl ResolverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cdp_id: CdpBreakpointId, dap_id: u32) {
        self.map.lock().insert(cdp_id, dap_id);
    }

    pub fn unregister(&self, cdp_id: &CdpBreakpointId) {
        self.map.lock().remove(cdp_id);
    }

    #[must_use]
    pub fn resolve(&self, cdp_id: &CdpBreakpointId) -> Option<u32> {
        self.map.lock().get(cdp_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inputs to the pause classifier that only the manager can supply (§4.6).
#[derive(Debug, Clone, Default)]
pub struct PauseEvent {
    pub reason: String,
    pub hit_breakpoints: Vec<CdpBreakpointId>,
    pub first_frame_script_id: Option<ScriptId>,
    pub pause_location: Option<UiLocation>,
    pub expected_pause_reason: Option<String>,
    pub target_entry_breakpoint: Option<u32>,
    pub inspect_brk: bool,
    pub mid_step_in: bool,
    pub exception_pause_should_surface: bool,
}

type EnabledFilter = Arc<dyn Fn(&Breakpoint) -> bool + Send + Sync>;

/// The authoritative mapping from DAP breakpoints to CDP installations for
/// one debug session.
pub struct BreakpointManager<C, S, P> {
    cdp: C,
    sources: S,
    predictor: P,
    config: ManagerConfig,
    next_id: u32,
    by_path: IndexMap<String, Vec<u32>>,
    by_ref: IndexMap<u32, Vec<u32>>,
    breakpoints: FxHashMap<u32, Breakpoint>,
    resolver: ResolverRegistry,
    module_entry_breakpoints: FxHashMap<String, u32>,
    launch_blockers: LaunchBlockers,
    enabled_filter: EnabledFilter,
    source_map: SourceMapCoordinator,
    statistics: Statistics,
}

impl<C, S, P> BreakpointManager<C, S, P>
where
    C: CdpClient,
    S: SourceContainer,
    P: Predictor,
{
    #[must_use]
    pub fn new(cdp: C, sources: S, predictor: P, config: ManagerConfig) -> Self {
        let source_map = SourceMapCoordinator::new(config.source_map_min_pause, config.source_map_cumulative_pause);
        Self {
            cdp,
            sources,
            predictor,
            config,
            next_id: 0,
            by_path: IndexMap::new(),
            by_ref: IndexMap::new(),
            breakpoints: FxHashMap::default(),
            resolver: ResolverRegistry::new(),
            module_entry_breakpoints: FxHashMap::default(),
            launch_blockers: LaunchBlockers::new(),
            enabled_filter: Arc::new(|_: &Breakpoint| true),
            source_map,
            statistics: Statistics::new(),
        }
    }

    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    #[must_use]
    pub fn launch_blockers(&self) -> &LaunchBlockers {
        &self.launch_blockers
    }

    #[must_use]
    pub fn resolver(&self) -> &ResolverRegistry {
        &self.resolver
    }

    #[must_use]
    pub fn breakpoint(&self, dap_id: u32) -> Option<&Breakpoint> {
        self.breakpoints.get(&dap_id)
    }

    #[must_use]
    pub fn source_map_handler_installed(&self) -> bool {
        self.source_map.is_installed()
    }

    #[must_use]
    pub fn source_map_cumulative_remaining(&self) -> std::time::Duration {
        self.source_map.cumulative_remaining()
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn ids_for_source(&self, key: &SourceKey) -> Vec<u32> {
        match key {
            SourceKey::Path(path) => self.by_path.get(path).cloned().unwrap_or_default(),
            SourceKey::Ref(r) => self.by_ref.get(r).cloned().unwrap_or_default(),
            SourceKey::Pattern(_) => Vec::new(),
        }
    }

    fn set_ids_for_source(&mut self, key: &SourceKey, ids: Vec<u32>) {
        match key {
            SourceKey::Path(path) => {
                self.by_path.insert(path.clone(), ids);
            }
            SourceKey::Ref(r) => {
                self.by_ref.insert(*r, ids);
            }
            SourceKey::Pattern(_) => {}
        }
    }

    fn dap_view_for(&self, ids: &[u32], source: &Source) -> Vec<DapBreakpoint> {
        ids.iter()
            .filter_map(|id| self.breakpoints.get(id))
            .map(|bp| bp.to_dap(Some(source.clone())))
            .collect()
    }

    fn sync_resolver(&self, id: u32) {
        if let Some(bp) = self.breakpoints.get(&id) {
            for reference in bp.references() {
                if let Some(cdp_id) = reference.cdp_id() {
                    self.resolver.register(cdp_id.clone(), id);
                }
            }
            self.statistics.mark_verified(id, bp.verified());
        }
    }

    /// §4.4.1: diffs `args.breakpoints` against the existing list for
    /// `source`, disables what fell out, enables what is new, and ensures
    /// the module-entry breakpoint invariant (§4.8).
    pub async fn set_breakpoints(
        &mut self,
        source: Source,
        args: &SetBreakpointsArguments,
    ) -> Result<Vec<DapBreakpoint>, BreakpointError> {
        let source_key = match (&source.path, source.source_reference) {
            (Some(path), _) => SourceKey::Path(normalize_path(path)),
            (None, Some(reference)) => SourceKey::Ref(reference),
            (None, None) => {
                return Err(BreakpointError::UnknownSource(
                    source.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                ))
            }
        };

        let existing_ids = self.ids_for_source(&source_key);

        let mut matched: FxHashSet<u32> = FxHashSet::default();
        let mut new_list: Vec<u32> = Vec::with_capacity(args.breakpoints.len());
        let mut freshly_created: Vec<u32> = Vec::new();

        for spec in &args.breakpoints {
            let existing_match = existing_ids
                .iter()
                .find(|id| !matched.contains(*id) && self.breakpoints.get(id).is_some_and(|bp| bp.equivalent_to(spec)))
                .copied();

            if let Some(id) = existing_match {
                matched.insert(id);
                new_list.push(id);
                continue;
            }

            let id = self.allocate_id();
            let bp = Breakpoint::from_source_breakpoint(id, source_key.clone(), spec);
            self.breakpoints.insert(id, bp);
            new_list.push(id);
            freshly_created.push(id);
        }

        let unbound: Vec<u32> = existing_ids.iter().filter(|id| !matched.contains(id)).copied().collect();

        // Step 5: unchanged request — no CDP traffic, no handler toggle.
        if unbound.is_empty() && freshly_created.is_empty() {
            return Ok(self.dap_view_for(&new_list, &source));
        }

        // Step 4/O2: the new list is installed before anything is awaited,
        // so a concurrent setBreakpoints for the same source observes it.
        self.set_ids_for_source(&source_key, new_list.clone());

        // Step 6.
        self.disable_many(&unbound).await;
        for id in &unbound {
            self.breakpoints.remove(id);
            self.statistics.forget(*id);
        }

        // Step 7.
        let live_before = existing_ids.len() - unbound.len();
        let live_after = new_list.len();
        if live_before == 0 && live_after > 0 {
            self.source_map.install(&self.cdp).await?;
        } else if live_before > 0 && live_after == 0 {
            self.source_map.uninstall(&self.cdp).await;
        }

        // Step 8.
        for id in &freshly_created {
            let passes = self.breakpoints.get(id).is_some_and(|bp| (self.enabled_filter)(bp));
            if !passes {
                continue;
            }
            if !self.ids_for_source(&source_key).contains(id) {
                continue; // superseded by a concurrent setBreakpoints
            }
            let outcome = self.enable_with_timeout(*id).await;
            self.launch_blockers.record(outcome);
        }

        // Step 9.
        if let SourceKey::Path(path) = &source_key {
            self.ensure_entry_breakpoint(path.clone()).await?;
        }

        // Step 10.
        for id in &freshly_created {
            if let Some(bp) = self.breakpoints.get(id) {
                bp.mark_set_completed();
            }
            self.statistics.register(*id);
        }

        Ok(self.dap_view_for(&new_list, &source))
    }

    /// Disables every id in `ids` concurrently, matching
    /// [`Breakpoint::disable`]'s own `futures::future::join_all` fan-out of
    /// its CDP removals.
    async fn disable_many(&mut self, ids: &[u32]) {
        let id_set: FxHashSet<u32> = ids.iter().copied().collect();

        let cdp_ids_by_id: FxHashMap<u32, Vec<CdpBreakpointId>> = self
            .breakpoints
            .iter()
            .filter(|(id, _)| id_set.contains(id))
            .map(|(id, bp)| (*id, bp.references().iter().filter_map(|r| r.cdp_id().cloned()).collect()))
            .collect();

        let cdp = &self.cdp;
        let disables = self
            .breakpoints
            .iter_mut()
            .filter(|(id, _)| id_set.contains(id))
            .map(|(_, bp)| bp.disable(cdp));
        let _ = futures::future::join_all(disables).await;

        for cdp_ids in cdp_ids_by_id.into_values() {
            for cdp_id in cdp_ids {
                self.resolver.unregister(&cdp_id);
            }
        }
    }

    /// Races `enable` against [`ManagerConfig::enable_timeout`]. True
    /// cancellation of an in-flight `enable` would drop any installs that
    /// had already resolved, so this drives `enable` to completion and
    /// classifies the outcome after the fact from elapsed time instead —
    /// launch is never made to block on it regardless of which outcome is
    /// recorded.
    async fn enable_with_timeout(&mut self, id: u32) -> LaunchBlockerOutcome {
        let started = tokio::time::Instant::now();
        if let Some(bp) = self.breakpoints.get_mut(&id) {
            let _ = bp.enable(&self.cdp, &self.sources, &self.predictor).await;
        }
        self.sync_resolver(id);

        if started.elapsed() > self.config.enable_timeout {
            LaunchBlockerOutcome::TimedOut
        } else {
            LaunchBlockerOutcome::Settled
        }
    }

    /// §4.8, run for every currently-known path-backed source. Called on
    /// runtime attach (when there was no intervening `setBreakpoints` to
    /// trigger the per-source check inline) so a target that attaches with
    /// breakpoints already registered from a prior session still gets its
    /// module-entry breakpoints.
    pub async fn ensure_entry_breakpoints_on_attach(&mut self) -> Result<(), BreakpointError> {
        let paths: Vec<String> = self.by_path.keys().cloned().collect();
        for path in paths {
            self.ensure_entry_breakpoint(path).await?;
        }
        Ok(())
    }

    /// §4.8. Short-circuits on sources with no absolute path, per Open
    /// Question (a): `byRef`-only sources never gain an automatic entry
    /// breakpoint. TODO: revisit whether that should also cover sources
    /// that only ever arrive via `sourceReference`.
    async fn ensure_entry_breakpoint(&mut self, path: String) -> Result<(), BreakpointError> {
        let ids = self.ids_for_source(&SourceKey::Path(path.clone()));
        let has_user_at_entry = ids
            .iter()
            .any(|id| self.breakpoints.get(id).is_some_and(Breakpoint::is_at_entry_position));
        if has_user_at_entry {
            return Ok(());
        }

        let mode_key = format!("{path}:{:?}", self.config.entry_breakpoint_mode);
        if self.module_entry_breakpoints.contains_key(&mode_key) {
            return Ok(());
        }

        // Deliberately not folded into `by_path`: that list is what
        // `setBreakpoints` diffs user requests against, and this id has no
        // corresponding `SourceBreakpoint` to ever match. Its lifetime is
        // tracked solely through `module_entry_breakpoints`.
        let id = self.allocate_id();
        let mut bp = Breakpoint::entry(id, SourceKey::Path(path.clone()), self.config.entry_breakpoint_mode);
        bp.enable(&self.cdp, &self.sources, &self.predictor).await?;
        self.breakpoints.insert(id, bp);
        self.sync_resolver(id);
        self.module_entry_breakpoints.insert(mode_key, id);
        Ok(())
    }

    /// §4.4.2. `target_entry_breakpoint` is the debug target's delegate
    /// entry breakpoint, which always votes to pause even though other
    /// Entry breakpoints default to a continue vote. Mutates the hit
    /// UserDefined breakpoints' hit counters, so call this exactly once
    /// per real pause event.
    pub fn should_pause_at(
        &mut self,
        hit_cdp_ids: &[CdpBreakpointId],
        target_entry_breakpoint: Option<u32>,
        continue_by_default: bool,
    ) -> (bool, Vec<u32>) {
        let mut pause_votes = 0u32;
        let mut continue_votes = u32::from(continue_by_default);
        let mut hit_dap_ids = Vec::new();

        for cdp_id in hit_cdp_ids {
            let Some(dap_id) = self.resolver.resolve(cdp_id) else {
                continue;
            };
            hit_dap_ids.push(dap_id);

            if Some(dap_id) == target_entry_breakpoint {
                pause_votes += 1;
                continue;
            }

            let Some(bp) = self.breakpoints.get_mut(&dap_id) else {
                continue;
            };
            let kind = bp.kind().clone();
            match kind {
                BreakpointKind::Entry {
                    mode: EntryBreakpointMode::Exact,
                } => {
                    continue_votes += 1;
                    bp.disarm_exact_entry();
                }
                BreakpointKind::Entry { .. } | BreakpointKind::PatternEntry { .. } | BreakpointKind::NeverResolved { .. } => {
                    continue_votes += 1;
                }
                BreakpointKind::UserDefined => {
                    if bp.record_hit() {
                        pause_votes += 1;
                    } else {
                        continue_votes += 1;
                    }
                }
            }
        }

        (pause_votes > 0 || continue_votes == 0, hit_dap_ids)
    }

    /// §4.4.3: moves every breakpoint in `from` that the source map can
    /// resolve to an optimal position in `to`; breakpoints without a
    /// mapping stay in `from`.
    pub async fn move_breakpoints(&mut self, from: &SourceKey, source_map_id: &str, to: SourceKey) {
        let ids = self.ids_for_source(from);
        for id in ids {
            let Some(bp) = self.breakpoints.get(&id) else {
                continue;
            };
            let probe = CdpLocation {
                line_number: bp.line().saturating_sub(1),
                column_number: bp.column().saturating_sub(1),
            };
            let Some(resolved) = self.sources.get_optimal_original_position(source_map_id, probe).await else {
                continue;
            };

            if let Some(bp) = self.breakpoints.get_mut(&id) {
                bp.update_source_location(to.clone(), resolved.line, resolved.column);
            }
            self.move_id_between_sources(from, &to, id);
        }
    }

    fn move_id_between_sources(&mut self, from: &SourceKey, to: &SourceKey, id: u32) {
        let mut from_ids = self.ids_for_source(from);
        from_ids.retain(|existing| *existing != id);
        self.set_ids_for_source(from, from_ids);

        let mut to_ids = self.ids_for_source(to);
        to_ids.push(id);
        self.set_ids_for_source(to, to_ids);
    }

    /// §4.4.4: compare-and-set swap of the enabled-filter predicate,
    /// followed by enabling/disabling every breakpoint per the new
    /// verdict. Returns `false` without effect if `compare` does not match
    /// the current filter.
    pub async fn apply_enabled_filter(&mut self, filter: EnabledFilter, compare: Option<&EnabledFilter>) -> bool {
        if let Some(expected) = compare {
            if !Arc::ptr_eq(&self.enabled_filter, expected) {
                return false;
            }
        }
        self.enabled_filter = filter;

        let ids: Vec<u32> = self.breakpoints.keys().copied().collect();
        for id in ids {
            let should_enable = self.breakpoints.get(&id).is_some_and(|bp| (self.enabled_filter)(bp));
            let currently_enabled = self.breakpoints.get(&id).is_some_and(Breakpoint::is_enabled);

            if should_enable && !currently_enabled {
                if let Some(bp) = self.breakpoints.get_mut(&id) {
                    let _ = bp.enable(&self.cdp, &self.sources, &self.predictor).await;
                }
                self.sync_resolver(id);
            } else if !should_enable && currently_enabled {
                let cdp_ids: Vec<CdpBreakpointId> = self
                    .breakpoints
                    .get(&id)
                    .map(|bp| bp.references().iter().filter_map(|r| r.cdp_id().cloned()).collect())
                    .unwrap_or_default();
                if let Some(bp) = self.breakpoints.get_mut(&id) {
                    let _ = bp.disable(&self.cdp).await;
                }
                for cdp_id in cdp_ids {
                    self.resolver.unregister(&cdp_id);
                }
            }
        }
        true
    }

    /// §4.5 "Handler invocation": routes a newly parsed source-mapped
    /// script to every breakpoint registered under any of its mapped
    /// sources or their nested sources, bounded by the coordinator's
    /// timeout budget. Returns the resolved locations plus an IDE-facing
    /// warning if the budget expired.
    pub async fn handle_script_parsed(
        &mut self,
        script: &ScriptInfo,
        mapped_sources: &[SourceKey],
    ) -> (Vec<UiLocation>, Option<OutputEventBody>) {
        if !self.source_map.claim_script(&script.script_id) {
            return (Vec::new(), None);
        }

        let all_sources = self.expand_mapped_sources(mapped_sources).await;
        let relevant_ids: Vec<u32> = all_sources.iter().flat_map(|key| self.ids_for_source(key)).collect();

        let cdp = &self.cdp;
        let sources = &self.sources;
        let breakpoints = &mut self.breakpoints;
        let work = async {
            let mut resolved = Vec::new();
            for id in &relevant_ids {
                if let Some(bp) = breakpoints.get_mut(id) {
                    resolved.extend(bp.update_for_new_locations(cdp, sources, script).await);
                }
            }
            resolved
        };

        let result = self.source_map.run_budgeted(work).await;
        for id in &relevant_ids {
            self.sync_resolver(*id);
        }

        match result {
            Ok(resolved) => (resolved, None),
            Err(err) => {
                tracing::warn!(error = %err, script_id = ?script.script_id, "source map handler timed out");
                (
                    Vec::new(),
                    Some(OutputEventBody::stderr(format!("source map handler timed out: {err}"))),
                )
            }
        }
    }

    /// §4.5: a source map's `sourceByUrl` entries can nest further source
    /// maps, so a script's directly reported sources are only the first
    /// level. Breadth-first expands `roots` by repeatedly asking the
    /// container for each source's own nested sources, deduping by key so
    /// a diamond-shaped nesting is only visited once.
    async fn expand_mapped_sources(&self, roots: &[SourceKey]) -> Vec<SourceKey> {
        let mut visited: FxHashSet<SourceKey> = roots.iter().cloned().collect();
        let mut frontier: Vec<SourceKey> = roots.to_vec();
        let mut all: Vec<SourceKey> = roots.to_vec();

        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for key in &frontier {
                for nested in self.sources.wait_for_source_map_sources(key).await {
                    if visited.insert(nested.clone()) {
                        all.push(nested.clone());
                        next_frontier.push(nested);
                    }
                }
            }
            frontier = next_frontier;
        }

        all
    }

    fn script_has_entry_or_pattern_reference(&self, script_id: &ScriptId) -> bool {
        self.breakpoints.values().any(|bp| {
            matches!(bp.kind(), BreakpointKind::Entry { .. } | BreakpointKind::PatternEntry { .. })
                && bp.references().iter().any(|r| match &r.key {
                    RequestKey::ByScriptId { script_id: sid, .. } => sid == script_id,
                    _ => r.resolved_locations.iter().any(|loc| loc.script_id.as_ref() == Some(script_id)),
                })
        })
    }

    /// §4.6: the pause classifier. Because `handle_script_parsed` is
    /// awaited synchronously at parse time rather than lazily driven from
    /// here, the handler's effects (if any) have already landed by the
    /// time a pause event can reference that script, so this compares
    /// directly against already-resolved locations instead of performing
    /// an additional bounded wait.
    pub fn handle_pause(&mut self, event: &PauseEvent) -> PauseVerdict {
        let first_frame_matches_entry = event
            .first_frame_script_id
            .as_ref()
            .is_some_and(|sid| self.script_has_entry_or_pattern_reference(sid));

        let any_hit_is_source_map_breakpoint = event.hit_breakpoints.iter().any(|id| {
            self.resolver
                .resolve(id)
                .and_then(|dap_id| self.breakpoints.get(&dap_id))
                .is_some_and(|bp| matches!(bp.kind(), BreakpointKind::Entry { .. } | BreakpointKind::PatternEntry { .. }))
        });

        let handler_ui_location_matches_pause = match &event.pause_location {
            Some(pause_loc) => event.hit_breakpoints.iter().any(|id| {
                self.resolver
                    .resolve(id)
                    .and_then(|dap_id| self.breakpoints.get(&dap_id))
                    .is_some_and(|bp| bp.references().iter().any(|r| r.resolved_locations.contains(pause_loc)))
            }),
            None => false,
        };

        let is_instrumentation_like =
            event.reason == "instrumentation" || first_frame_matches_entry || any_hit_is_source_map_breakpoint;

        let (should_pause, hit_dap_ids) =
            self.should_pause_at(&event.hit_breakpoints, event.target_entry_breakpoint, is_instrumentation_like);

        for id in &hit_dap_ids {
            self.statistics.mark_hit(*id);
        }

        let inputs = PauseInputs {
            reason: event.reason.clone(),
            hit_breakpoint_dap_ids: hit_dap_ids,
            first_frame_matches_entry,
            any_hit_is_source_map_breakpoint,
            handler_ui_location_matches_pause,
            inspect_brk: event.inspect_brk,
            mid_step_in: event.mid_step_in,
            should_pause_at_continue_by_default_true: should_pause,
            should_pause_at_continue_by_default_false: should_pause,
            exception_pause_should_surface: event.exception_pause_should_surface,
            expected_pause_reason: event.expected_pause_reason.clone(),
        };

        pause::classify(&inputs)
    }

    /// Waits (bounded) for every hit breakpoint's deferred "set completed"
    /// signal before the caller emits a DAP `stopped` event (§4.6 tail).
    pub async fn settle_hit_breakpoints(&self, hit_dap_ids: &[u32]) {
        let refs: Vec<&Breakpoint> = hit_dap_ids.iter().filter_map(|id| self.breakpoints.get(id)).collect();
        pause::settle_before_stopped(&refs, self.config.resolve_before_stopped_timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::{
        PredictParams, PredictedLocation, ResolvedSource, SetBreakpointByUrlParams, SetBreakpointByUrlResult,
        SetBreakpointParams, SetBreakpointResult, SourceMapTimeouts,
    };
    use crate::protocol::SourceBreakpoint;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FakeCdp {
        next_id: AtomicU32,
        by_url_calls: Mutex<Vec<SetBreakpointByUrlParams>>,
        by_script_calls: Mutex<Vec<SetBreakpointParams>>,
    }

    impl FakeCdp {
        fn new() -> Self {
            Self {
                next_id: AtomicU32::new(0),
                by_url_calls: Mutex::new(Vec::new()),
                by_script_calls: Mutex::new(Vec::new()),
            }
        }

        fn next(&self) -> String {
            format!("cdp-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
        }
    }

    impl CdpClient for FakeCdp {
        async fn set_breakpoint_by_url(
            &self,
            params: SetBreakpointByUrlParams,
        ) -> Result<SetBreakpointByUrlResult, BreakpointError> {
            self.by_url_calls.lock().push(params);
            Ok(SetBreakpointByUrlResult {
                breakpoint_id: CdpBreakpointId(self.next()),
                locations: Vec::new(),
            })
        }

        async fn set_breakpoint(&self, params: SetBreakpointParams) -> Result<SetBreakpointResult, BreakpointError> {
            self.by_script_calls.lock().push(params.clone());
            Ok(SetBreakpointResult {
                breakpoint_id: CdpBreakpointId(self.next()),
                actual_location: CdpLocation {
                    line_number: params.line_number,
                    column_number: params.column_number,
                },
            })
        }

        async fn remove_breakpoint(&self, _id: &CdpBreakpointId) -> Result<(), BreakpointError> {
            Ok(())
        }

        async fn set_instrumentation_breakpoint(&self, _instrumentation: &str) -> Result<CdpBreakpointId, BreakpointError> {
            Ok(CdpBreakpointId(self.next()))
        }
    }

    struct FakeSources;

    impl SourceContainer for FakeSources {
        async fn source(&self, source: &Source) -> Option<ResolvedSource> {
            source.path.as_ref().map(|path| ResolvedSource {
                source_key: SourceKey::Path(normalize_path(path)),
                url: Some(format!("file://{path}")),
                has_source_map: false,
            })
        }

        async fn url_for_path(&self, path: &str) -> Option<String> {
            Some(format!("file://{path}"))
        }

        async fn current_sibling_ui_locations(&self, _loc: &UiLocation, _in_source: Option<&SourceKey>) -> Vec<UiLocation> {
            Vec::new()
        }

        async fn preferred_ui_location(&self, loc: &UiLocation) -> UiLocation {
            loc.clone()
        }

        async fn get_optimal_original_position(&self, _source_map_id: &str, _pos: CdpLocation) -> Option<UiLocation> {
            None
        }

        async fn wait_for_source_map_sources(&self, _source: &SourceKey) -> Vec<SourceKey> {
            Vec::new()
        }

        fn clear_disabled_source_maps(&self) {}

        fn disable_source_map_for_source(&self, _source: &SourceKey) {}

        fn source_map_timeouts(&self) -> SourceMapTimeouts {
            SourceMapTimeouts {
                source_map_min_pause: Duration::from_millis(1000),
                source_map_cumulative_pause: Duration::from_millis(10_000),
            }
        }
    }

    struct FakePredictor;

    impl Predictor for FakePredictor {
        async fn predict_breakpoints(&self, _params: &PredictParams) {}

        async fn predicted_resolved_locations(&self, _params: &PredictParams) -> Vec<PredictedLocation> {
            Vec::new()
        }
    }

    fn manager() -> BreakpointManager<FakeCdp, FakeSources, FakePredictor> {
        BreakpointManager::new(FakeCdp::new(), FakeSources, FakePredictor, ManagerConfig::default())
    }

    fn source(path: &str) -> Source {
        Source {
            name: None,
            path: Some(path.to_string()),
            source_reference: None,
        }
    }

    fn args(specs: Vec<SourceBreakpoint>) -> SetBreakpointsArguments {
        SetBreakpointsArguments {
            source: source("/x/a.js"),
            breakpoints: specs,
            source_modified: None,
        }
    }

    fn bp_spec(line: u32) -> SourceBreakpoint {
        SourceBreakpoint {
            line,
            column: None,
            condition: None,
            hit_condition: None,
            log_message: None,
        }
    }

    #[tokio::test]
    async fn first_set_breakpoints_assigns_id_one_and_installs_by_url() {
        let mut mgr = manager();
        let result = mgr.set_breakpoints(source("/x/a.js"), &args(vec![bp_spec(10)])).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 1);
        assert!(!result[0].verified);
        assert!(mgr.source_map_handler_installed());
    }

    #[tokio::test]
    async fn repeat_identical_set_breakpoints_is_idempotent() {
        let mut mgr = manager();
        let spec = args(vec![bp_spec(10)]);
        let first = mgr.set_breakpoints(source("/x/a.js"), &spec).await.unwrap();
        let registrations_after_first = mgr.resolver().len();
        let second = mgr.set_breakpoints(source("/x/a.js"), &spec).await.unwrap();
        assert_eq!(first[0].id, second[0].id);
        // No new CDP installs on the second, identical request.
        assert_eq!(mgr.resolver().len(), registrations_after_first);
    }

    #[tokio::test]
    async fn ensure_entry_breakpoints_on_attach_is_idempotent_after_set_breakpoints() {
        let mut mgr = manager();
        mgr.set_breakpoints(source("/x/a.js"), &args(vec![bp_spec(10)])).await.unwrap();
        let module_entry_count_before = mgr.module_entry_breakpoints.len();
        let resolver_len_before = mgr.resolver().len();

        mgr.ensure_entry_breakpoints_on_attach().await.unwrap();

        assert_eq!(mgr.module_entry_breakpoints.len(), module_entry_count_before);
        assert_eq!(mgr.resolver().len(), resolver_len_before);
    }

    #[tokio::test]
    async fn should_pause_at_counts_votes_and_disarms_exact_entry() {
        let mut mgr = manager();
        mgr.set_breakpoints(source("/x/a.js"), &args(vec![bp_spec(10)])).await.unwrap();

        // Synthesize a resolved entry breakpoint reference so should_pause_at has
        // something to resolve through the registry.
        let entry_id = 999;
        mgr.breakpoints.insert(
            entry_id,
            Breakpoint::entry(entry_id, SourceKey::Path("/x/a.js".to_string()), EntryBreakpointMode::Exact),
        );
        let cdp_id = CdpBreakpointId("entry-cdp".to_string());
        mgr.resolver.register(cdp_id.clone(), entry_id);

        let (should_pause, hits) = mgr.should_pause_at(&[cdp_id], None, false);
        assert!(!should_pause);
        assert_eq!(hits, vec![entry_id]);
        assert!(!mgr.breakpoints.get(&entry_id).unwrap().is_enabled());
    }
}
