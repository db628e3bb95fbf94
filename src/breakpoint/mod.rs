//! The breakpoint object (§4.3): owns one logical DAP breakpoint's set of
//! CDP installations, and the policy each variant follows for installing,
//! evaluating hit conditions, and reporting to the IDE.
//!
//! Grounded on `trust_runtime::debug::DebugBreakpoint`'s field shape
//! (condition / hit_condition / log_message / hits) and on `trust-debug`'s
//! single DAP-facing `Breakpoint` type, restructured into a tagged-variant
//! base (`BreakpointKind`) over a common CDP-reference ledger, per §9
//! "Polymorphism" — the teacher has only ever needed one kind of
//! breakpoint, since its runtime is in-process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::Notify;

use crate::condition::build_condition;
use crate::error::BreakpointError;
use crate::hit_condition::{HitCondition, HitConditionPredicate};
use crate::peers::{
    CdpClient, Predictor, PredictParams, SetBreakpointByUrlParams, SetBreakpointParams,
    SourceContainer, UiLocation,
};
use crate::protocol::{CdpBreakpointId, DapBreakpoint, ScriptId, ScriptInfo, Source, SourceBreakpoint};

/// Origin identifier for a breakpoint's source: either a case-normalized
/// absolute path, an opaque source reference, or (for `PatternEntry`) the
/// raw glob pattern it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Path(String),
    Ref(u32),
    Pattern(String),
}

/// Case-normalizes an absolute path the way the host filesystem would:
/// case-insensitive (and forward-slashed) for drive-letter paths, verbatim
/// otherwise.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let looks_like_windows_drive = path.len() >= 2 && path.as_bytes()[1] == b':';
    if looks_like_windows_drive {
        path.replace('\\', "/").to_lowercase()
    } else {
        path.to_string()
    }
}

/// Entry-breakpoint installation mode (§4.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryBreakpointMode {
    Exact,
    Greedy,
}

/// Breakpoint variant tag (§3, §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointKind {
    UserDefined,
    Entry { mode: EntryBreakpointMode },
    PatternEntry { pattern: String },
    NeverResolved { message: String },
}

/// The deduplication key for one CDP installation request (§4.3.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    ByUrl { url: String, line: u32, column: u32 },
    ByUrlRegex { pattern: String, line: u32, column: u32 },
    ByScriptId { script_id: ScriptId, line: u32, column: u32 },
}

/// The lifecycle state of one CDP reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdpRefState {
    Pending,
    Applied(CdpBreakpointId),
    Disposed,
}

/// One installation of a breakpoint against the runtime.
#[derive(Debug, Clone)]
pub struct CdpReference {
    pub key: RequestKey,
    pub state: CdpRefState,
    pub resolved_locations: Vec<UiLocation>,
}

impl CdpReference {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self.state, CdpRefState::Applied(_))
    }

    #[must_use]
    pub fn cdp_id(&self) -> Option<&CdpBreakpointId> {
        match &self.state {
            CdpRefState::Applied(id) => Some(id),
            _ => None,
        }
    }
}

/// One logical DAP breakpoint and the CDP installations backing it.
pub struct Breakpoint {
    id: u32,
    source_key: SourceKey,
    line: u32,
    column: u32,
    condition: Option<String>,
    log_message: Option<String>,
    hit_condition: Option<String>,
    kind: BreakpointKind,
    enabled: bool,
    references: Vec<CdpReference>,
    claimed_keys: Mutex<FxHashSet<RequestKey>>,
    hit_predicate: HitConditionPredicate,
    cdp_condition: Option<String>,
    set_completed: Arc<Notify>,
    set_completed_fired: AtomicBool,
}

impl Breakpoint {
    /// Builds a breakpoint from one `SourceBreakpoint` in a `setBreakpoints`
    /// request. An unparseable `hitCondition` or `logMessage` degrades the
    /// breakpoint to `NeverResolved` rather than failing the whole request
    /// (§7).
    #[must_use]
    pub fn from_source_breakpoint(id: u32, source_key: SourceKey, spec: &SourceBreakpoint) -> Self {
        let line = spec.line.max(1);
        let column = spec.column.unwrap_or(1).max(1);

        let parsed_hit = spec.hit_condition.as_deref().map(HitCondition::parse);
        let built_condition = build_condition(spec.condition.as_deref(), spec.log_message.as_deref());

        let invalid = match (&parsed_hit, &built_condition) {
            (Some(Err(e)), _) => Some(e.to_string()),
            (_, Err(e)) => Some(e.to_string()),
            _ => None,
        };

        let (kind, hit_predicate, cdp_condition) = match invalid {
            Some(message) => (
                BreakpointKind::NeverResolved { message },
                HitConditionPredicate::never(),
                None,
            ),
            None => {
                let hit_predicate = match parsed_hit {
                    Some(Ok(hc)) => hc.into_predicate(),
                    _ => HitConditionPredicate::always(),
                };
                (
                    BreakpointKind::UserDefined,
                    hit_predicate,
                    built_condition.unwrap_or(None),
                )
            }
        };

        Self {
            id,
            source_key,
            line,
            column,
            condition: spec.condition.clone(),
            log_message: spec.log_message.clone(),
            hit_condition: spec.hit_condition.clone(),
            kind,
            enabled: false,
            references: Vec::new(),
            claimed_keys: Mutex::new(FxHashSet::default()),
            hit_predicate,
            cdp_condition,
            set_completed: Arc::new(Notify::new()),
            set_completed_fired: AtomicBool::new(false),
        }
    }

    /// Builds a module-entry breakpoint at (1, 1) (§4.8).
    #[must_use]
    pub fn entry(id: u32, source_key: SourceKey, mode: EntryBreakpointMode) -> Self {
        Self {
            id,
            source_key,
            line: 1,
            column: 1,
            condition: None,
            log_message: None,
            hit_condition: None,
            kind: BreakpointKind::Entry { mode },
            enabled: false,
            references: Vec::new(),
            claimed_keys: Mutex::new(FxHashSet::default()),
            hit_predicate: HitConditionPredicate::always(),
            cdp_condition: None,
            set_completed: Arc::new(Notify::new()),
            set_completed_fired: AtomicBool::new(false),
        }
    }

    /// Builds a pattern-entry breakpoint from a user-supplied glob pattern.
    #[must_use]
    pub fn pattern_entry(id: u32, pattern: String) -> Self {
        Self {
            id,
            source_key: SourceKey::Pattern(pattern.clone()),
            line: 1,
            column: 1,
            condition: None,
            log_message: None,
            hit_condition: None,
            kind: BreakpointKind::PatternEntry { pattern },
            enabled: false,
            references: Vec::new(),
            claimed_keys: Mutex::new(FxHashSet::default()),
            hit_predicate: HitConditionPredicate::always(),
            cdp_condition: None,
            set_completed: Arc::new(Notify::new()),
            set_completed_fired: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn source_key(&self) -> &SourceKey {
        &self.source_key
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }

    #[must_use]
    pub fn kind(&self) -> &BreakpointKind {
        &self.kind
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn is_at_entry_position(&self) -> bool {
        self.line == 1 && self.column == 1
    }

    #[must_use]
    pub fn references(&self) -> &[CdpReference] {
        &self.references
    }

    /// I3: verified iff at least one reference is Applied with a resolved
    /// location.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.references
            .iter()
            .any(|r| r.is_applied() && !r.resolved_locations.is_empty())
    }

    #[must_use]
    pub fn references_cdp_id(&self, cdp_id: &CdpBreakpointId) -> bool {
        self.references.iter().any(|r| r.cdp_id() == Some(cdp_id))
    }

    /// The expression actually installed on the runtime side (user
    /// condition, logpoint rewrite, or both combined).
    #[must_use]
    pub fn cdp_condition(&self) -> Option<&str> {
        self.cdp_condition.as_deref()
    }

    /// Diff-equivalence used by `setBreakpoints` reconciliation (§4.3.3,
    /// `UserDefined::equivalentTo`).
    #[must_use]
    pub fn equivalent_to(&self, spec: &SourceBreakpoint) -> bool {
        let line = spec.line.max(1);
        let column = spec.column.unwrap_or(1).max(1);
        self.line == line
            && self.column == column
            && self.condition.as_deref() == spec.condition.as_deref()
            && self.log_message.as_deref() == spec.log_message.as_deref()
            && self.hit_condition.as_deref() == spec.hit_condition.as_deref()
    }

    #[must_use]
    pub fn to_dap(&self, source: Option<Source>) -> DapBreakpoint {
        let message = match &self.kind {
            BreakpointKind::NeverResolved { message } => Some(message.clone()),
            _ => None,
        };
        DapBreakpoint {
            id: self.id,
            verified: self.verified(),
            message,
            source,
            line: Some(self.line),
            column: Some(self.column),
        }
    }

    /// §4.1: advances the hit counter and reports whether this hit should
    /// stay paused.
    pub fn record_hit(&mut self) -> bool {
        self.hit_predicate.record_hit()
    }

    /// Used by `shouldPauseAt` to silence a one-shot Exact-mode entry
    /// breakpoint after its first hit.
    pub fn disarm_exact_entry(&mut self) {
        if let BreakpointKind::Entry {
            mode: EntryBreakpointMode::Exact,
        } = self.kind
        {
            self.enabled = false;
        }
    }

    /// Rewrites the breakpoint's origin (§4.4.3 `moveBreakpoints`, §4.3
    /// `updateSourceLocation`). No CDP traffic: existing references stay
    /// bound to their old request keys until the next `disable`/`enable`.
    pub fn update_source_location(&mut self, new_source_key: SourceKey, new_line: u32, new_column: u32) {
        self.source_key = new_source_key;
        self.line = new_line.max(1);
        self.column = new_column.max(1);
    }

    pub fn mark_set_completed(&self) {
        self.set_completed_fired.store(true, Ordering::SeqCst);
        self.set_completed.notify_waiters();
    }

    /// Waits for this breakpoint's deferred "set completed" signal, or
    /// returns immediately if it already fired.
    pub async fn wait_set_completed(&self) {
        if self.set_completed_fired.load(Ordering::SeqCst) {
            return;
        }
        self.set_completed.notified().await;
    }

    fn claim_key(&self, key: &RequestKey) -> bool {
        let mut claimed = self.claimed_keys.lock();
        if claimed.contains(key) {
            false
        } else {
            claimed.insert(key.clone());
            true
        }
    }

    /// `enable` (§4.3, §4.3.2): runs the three installation strategies
    /// concurrently on this single cooperative task (`tokio::join!`, not
    /// OS threads — §5) and merges their results in afterward, so only one
    /// `&mut self` borrow of `references` is ever live at a time.
    pub async fn enable<C, S, P>(&mut self, cdp: &C, sources: &S, predictor: &P) -> Result<(), BreakpointError>
    where
        C: CdpClient,
        S: SourceContainer,
        P: Predictor,
    {
        self.enabled = true;
        if matches!(self.kind, BreakpointKind::NeverResolved { .. }) {
            return Ok(());
        }

        let by_path = self.install_by_path(cdp, sources);
        let by_predicted = self.install_by_predicted(cdp, predictor);
        let by_current = self.install_by_current_ui(cdp, sources);

        let (path_refs, predicted_refs, current_refs) = tokio::join!(by_path, by_predicted, by_current);

        self.references.extend(path_refs);
        self.references.extend(predicted_refs);
        self.references.extend(current_refs);

        Ok(())
    }

    /// `disable` (§4.3): removes every Applied CDP id, concurrently, then
    /// drops all references. Per-breakpoint serialization (O1) falls out
    /// of the borrow checker: a caller cannot hold another `&mut self`
    /// call in flight while this one runs.
    pub async fn disable<C: CdpClient>(&mut self, cdp: &C) -> Result<(), BreakpointError> {
        self.enabled = false;

        let ids: Vec<CdpBreakpointId> = self.references.iter().filter_map(CdpReference::cdp_id).cloned().collect();
        let removals = ids.iter().map(|id| cdp.remove_breakpoint(id));
        let results = futures::future::join_all(removals).await;

        for (id, result) in ids.iter().zip(results) {
            if let Err(err) = result {
                tracing::warn!(breakpoint_id = self.id, cdp_id = ?id, error = %err, "removeBreakpoint failed");
            }
        }

        self.references.clear();
        self.claimed_keys.lock().clear();
        Ok(())
    }

    /// §4.3.2 strategy 3, invoked by the source-map coordinator when a new
    /// script's source map newly reaches this breakpoint's source. Returns
    /// the resolved locations so the pause path can compare them against
    /// the current pause location.
    pub async fn update_for_new_locations<C: CdpClient, S: SourceContainer>(
        &mut self,
        cdp: &C,
        sources: &S,
        script: &ScriptInfo,
    ) -> Vec<UiLocation> {
        let refs = self
            .resolve_sibling_references(cdp, sources, Some(&script.script_id))
            .await;
        let resolved: Vec<UiLocation> = refs.iter().flat_map(|r| r.resolved_locations.iter().cloned()).collect();
        self.references.extend(refs);
        resolved
    }

    /// §4.3.2 strategy 1.
    async fn install_by_path<C: CdpClient, S: SourceContainer>(&self, cdp: &C, sources: &S) -> Vec<CdpReference> {
        let url = match &self.source_key {
            SourceKey::Path(path) => match sources.url_for_path(path).await {
                Some(url) => url,
                None => return Vec::new(),
            },
            SourceKey::Pattern(pattern) => return self.install_pattern_regex(cdp, pattern).await,
            SourceKey::Ref(_) => return Vec::new(),
        };

        if let BreakpointKind::Entry {
            mode: EntryBreakpointMode::Greedy,
        } = self.kind
        {
            let basename = url.rsplit('/').next().unwrap_or(&url);
            return self.install_url_regex(cdp, &regex_escape(basename)).await;
        }

        self.install_url(cdp, url).await
    }

    async fn install_pattern_regex<C: CdpClient>(&self, cdp: &C, pattern: &str) -> Vec<CdpReference> {
        self.install_url_regex(cdp, &glob_to_regex(pattern)).await
    }

    async fn install_url<C: CdpClient>(&self, cdp: &C, url: String) -> Vec<CdpReference> {
        let line = self.line - 1;
        let column = self.column - 1;
        let key = RequestKey::ByUrl { url: url.clone(), line, column };
        if !self.claim_key(&key) {
            return Vec::new();
        }

        match cdp
            .set_breakpoint_by_url(SetBreakpointByUrlParams {
                url: Some(url),
                url_regex: None,
                line_number: line,
                column_number: column,
                condition: self.cdp_condition.clone(),
            })
            .await
        {
            Ok(result) => vec![self.applied_by_url(key, result.breakpoint_id, result.locations)],
            Err(err) => {
                tracing::warn!(breakpoint_id = self.id, error = %err, "setBreakpointByUrl failed");
                Vec::new()
            }
        }
    }

    async fn install_url_regex<C: CdpClient>(&self, cdp: &C, pattern: &str) -> Vec<CdpReference> {
        let line = self.line - 1;
        let column = self.column - 1;
        let key = RequestKey::ByUrlRegex {
            pattern: pattern.to_string(),
            line,
            column,
        };
        if !self.claim_key(&key) {
            return Vec::new();
        }

        match cdp
            .set_breakpoint_by_url(SetBreakpointByUrlParams {
                url: None,
                url_regex: Some(pattern.to_string()),
                line_number: line,
                column_number: column,
                condition: self.cdp_condition.clone(),
            })
            .await
        {
            Ok(result) => vec![self.applied_by_url(key, result.breakpoint_id, result.locations)],
            Err(err) => {
                tracing::warn!(breakpoint_id = self.id, error = %err, "setBreakpointByUrl (regex) failed");
                Vec::new()
            }
        }
    }

    fn applied_by_url(
        &self,
        key: RequestKey,
        breakpoint_id: CdpBreakpointId,
        locations: Vec<crate::protocol::CdpLocation>,
    ) -> CdpReference {
        CdpReference {
            key,
            state: CdpRefState::Applied(breakpoint_id),
            resolved_locations: locations
                .into_iter()
                .map(|loc| UiLocation {
                    source_key: self.source_key.clone(),
                    line: loc.line_number + 1,
                    column: loc.column_number + 1,
                    script_id: None,
                })
                .collect(),
        }
    }

    /// §4.3.2 strategy 2.
    async fn install_by_predicted<C: CdpClient, P: Predictor>(&self, cdp: &C, predictor: &P) -> Vec<CdpReference> {
        if matches!(
            self.kind,
            BreakpointKind::Entry { .. } | BreakpointKind::PatternEntry { .. }
        ) {
            return Vec::new();
        }
        let SourceKey::Path(path) = &self.source_key else {
            return Vec::new();
        };

        let params = PredictParams {
            absolute_path: path.clone(),
            line: self.line,
            column: self.column,
        };
        let predicted = predictor.predicted_resolved_locations(&params).await;

        let mut out = Vec::new();
        for location in predicted {
            let key = RequestKey::ByUrl {
                url: location.url.clone(),
                line: location.line_number,
                column: location.column_number,
            };
            if !self.claim_key(&key) {
                continue;
            }
            match cdp
                .set_breakpoint_by_url(SetBreakpointByUrlParams {
                    url: Some(location.url.clone()),
                    url_regex: None,
                    line_number: location.line_number,
                    column_number: location.column_number,
                    condition: self.cdp_condition.clone(),
                })
                .await
            {
                Ok(result) => out.push(self.applied_by_url(key, result.breakpoint_id, result.locations)),
                Err(err) => {
                    tracing::warn!(breakpoint_id = self.id, error = %err, "predicted setBreakpointByUrl failed");
                }
            }
        }
        out
    }

    /// §4.3.2 strategy 3 (read-only form used inside `enable`, and the
    /// script-filtered form used by `update_for_new_locations`).
    async fn install_by_current_ui<C: CdpClient, S: SourceContainer>(&self, cdp: &C, sources: &S) -> Vec<CdpReference> {
        self.resolve_sibling_references(cdp, sources, None).await
    }

    async fn resolve_sibling_references<C: CdpClient, S: SourceContainer>(
        &self,
        cdp: &C,
        sources: &S,
        filter_script: Option<&ScriptId>,
    ) -> Vec<CdpReference> {
        let origin = UiLocation {
            source_key: self.source_key.clone(),
            line: self.line,
            column: self.column,
            script_id: filter_script.cloned(),
        };
        let siblings = sources.current_sibling_ui_locations(&origin, Some(&self.source_key)).await;

        let mut out = Vec::new();
        for sibling in siblings {
            let Some(script_id) = sibling.script_id.clone() else {
                continue;
            };
            if let Some(only) = filter_script {
                if &script_id != only {
                    continue;
                }
            }
            let line = sibling.line.saturating_sub(1);
            let column = sibling.column.saturating_sub(1);
            let key = RequestKey::ByScriptId {
                script_id: script_id.clone(),
                line,
                column,
            };
            if !self.claim_key(&key) {
                continue;
            }

            match cdp
                .set_breakpoint(SetBreakpointParams {
                    script_id: script_id.clone(),
                    line_number: line,
                    column_number: column,
                    condition: self.cdp_condition.clone(),
                })
                .await
            {
                Ok(result) => out.push(CdpReference {
                    key,
                    state: CdpRefState::Applied(result.breakpoint_id),
                    resolved_locations: vec![UiLocation {
                        source_key: self.source_key.clone(),
                        line: result.actual_location.line_number + 1,
                        column: result.actual_location.column_number + 1,
                        script_id: Some(script_id),
                    }],
                }),
                Err(err) => {
                    tracing::warn!(breakpoint_id = self.id, error = %err, "setBreakpoint by scriptId failed");
                }
            }
        }
        out
    }
}

/// Escapes regex metacharacters so a literal string can be embedded in a
/// CDP `urlRegex` pattern (used by Greedy entry breakpoints).
fn regex_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if "\\^$.|?*+()[]{}".contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Glob-to-regex for `PatternEntry` breakpoints (§4.3.3): forces
/// forward-slashes and case-insensitive matching (so a Windows drive
/// letter compares equal regardless of case).
fn glob_to_regex(pattern: &str) -> String {
    let normalized = pattern.replace('\\', "/");
    let mut out = String::from("(?i)");
    let mut chars = normalized.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            c if "^$.|+()[]{}".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(line: u32, hit_condition: Option<&str>) -> SourceBreakpoint {
        SourceBreakpoint {
            line,
            column: None,
            condition: None,
            hit_condition: hit_condition.map(str::to_string),
            log_message: None,
        }
    }

    #[test]
    fn invalid_hit_condition_degrades_to_never_resolved() {
        let bp = Breakpoint::from_source_breakpoint(1, SourceKey::Path("/a.js".into()), &spec(10, Some("garbage")));
        assert!(matches!(bp.kind(), BreakpointKind::NeverResolved { .. }));
        assert!(!bp.verified());
    }

    #[test]
    fn valid_breakpoint_defaults_column_to_one() {
        let bp = Breakpoint::from_source_breakpoint(1, SourceKey::Path("/a.js".into()), &spec(10, None));
        assert_eq!(bp.column(), 1);
        assert!(matches!(bp.kind(), BreakpointKind::UserDefined));
    }

    #[test]
    fn equivalent_to_matches_on_all_diff_fields() {
        let original = spec(10, Some("> 1"));
        let bp = Breakpoint::from_source_breakpoint(1, SourceKey::Path("/a.js".into()), &original);
        assert!(bp.equivalent_to(&original));
        assert!(!bp.equivalent_to(&spec(11, Some("> 1"))));
    }

    #[test]
    fn entry_breakpoint_is_at_one_one() {
        let bp = Breakpoint::entry(2, SourceKey::Path("/a.js".into()), EntryBreakpointMode::Exact);
        assert!(bp.is_at_entry_position());
    }

    #[test]
    fn normalize_path_lowercases_drive_letters_only() {
        assert_eq!(normalize_path("C:\\Users\\a.js"), "c:/users/a.js");
        assert_eq!(normalize_path("/Users/a.js"), "/Users/a.js");
    }
}
