//! Trait interfaces for the collaborators this core only reaches through
//! §6's interfaces: the CDP connection, the source container, and the
//! predictor. Grounded on the `async fn` trait pattern `crates/trust-lsp`
//! uses for its own backend trait, generalized to three narrower traits
//! rather than one God trait, since each peer here has a genuinely
//! distinct responsibility.
//!
//! These are plain `async fn`-in-trait definitions, not `dyn`-safe objects:
//! [`crate::manager::BreakpointManager`] is generic over its three peer
//! types instead of boxing them, which keeps call sites monomorphized and
//! avoids a dependency on `async-trait`.

use std::time::Duration;

use crate::error::BreakpointError;
use crate::protocol::{CdpBreakpointId, CdpLocation, ScriptId};

/// A location in DAP (source) coordinates, 1-based, resolved against some
/// source the container knows about.
///
/// `script_id` carries the currently-known compiled script this location
/// resolves against, when the container has one on hand — the container
/// needs this internally to answer `currentSiblingUiLocations` in the
/// first place, so it is exposed here rather than re-derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiLocation {
    pub source_key: crate::breakpoint::SourceKey,
    pub line: u32,
    pub column: u32,
    pub script_id: Option<ScriptId>,
}

/// What the source container knows about a DAP `Source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub source_key: crate::breakpoint::SourceKey,
    pub url: Option<String>,
    pub has_source_map: bool,
}

/// The two source-map wait budgets, as reported by the source container.
#[derive(Debug, Clone, Copy)]
pub struct SourceMapTimeouts {
    pub source_map_min_pause: Duration,
    pub source_map_cumulative_pause: Duration,
}

/// `{absolutePath, lineNumber, columnNumber}` — a predicted-location query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictParams {
    pub absolute_path: String,
    pub line: u32,
    pub column: u32,
}

/// A predicted compiled location, installable by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictedLocation {
    pub url: String,
    pub line_number: u32,
    pub column_number: u32,
}

/// `Debugger.setBreakpointByUrl` parameters (§6). Exactly one of `url`/
/// `url_regex` is set.
#[derive(Debug, Clone)]
pub struct SetBreakpointByUrlParams {
    pub url: Option<String>,
    pub url_regex: Option<String>,
    pub line_number: u32,
    pub column_number: u32,
    pub condition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SetBreakpointByUrlResult {
    pub breakpoint_id: CdpBreakpointId,
    pub locations: Vec<CdpLocation>,
}

/// `Debugger.setBreakpoint` parameters (§6), for installing against an
/// already-known script id.
#[derive(Debug, Clone)]
pub struct SetBreakpointParams {
    pub script_id: ScriptId,
    pub line_number: u32,
    pub column_number: u32,
    pub condition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SetBreakpointResult {
    pub breakpoint_id: CdpBreakpointId,
    pub actual_location: CdpLocation,
}

/// The runtime debugger connection (§6 "Runtime (CDP) operations consumed").
pub trait CdpClient {
    /// Installs by URL or URL-regex. CDP resolves it against every script
    /// already loaded and every script loaded in the future.
    async fn set_breakpoint_by_url(
        &self,
        params: SetBreakpointByUrlParams,
    ) -> Result<SetBreakpointByUrlResult, BreakpointError>;

    /// Installs against one already-known script id.
    async fn set_breakpoint(
        &self,
        params: SetBreakpointParams,
    ) -> Result<SetBreakpointResult, BreakpointError>;

    async fn remove_breakpoint(&self, id: &CdpBreakpointId) -> Result<(), BreakpointError>;

    /// `Debugger.setInstrumentationBreakpoint`. `instrumentation` is e.g.
    /// `"beforeScriptWithSourceMapExecution"`.
    async fn set_instrumentation_breakpoint(
        &self,
        instrumentation: &str,
    ) -> Result<CdpBreakpointId, BreakpointError>;
}

/// The source container peer (§6 "Source container (peer) interface").
pub trait SourceContainer {
    async fn source(
        &self,
        source: &crate::protocol::Source,
    ) -> Option<ResolvedSource>;

    /// Resolves an absolute path to the URL the runtime would serve it
    /// under, when no URL is already known. Used by the by-path strategy.
    async fn url_for_path(&self, path: &str) -> Option<String>;

    async fn current_sibling_ui_locations(
        &self,
        loc: &UiLocation,
        in_source: Option<&crate::breakpoint::SourceKey>,
    ) -> Vec<UiLocation>;

    async fn preferred_ui_location(&self, loc: &UiLocation) -> UiLocation;

    async fn get_optimal_original_position(
        &self,
        source_map_id: &str,
        pos: CdpLocation,
    ) -> Option<UiLocation>;

    async fn wait_for_source_map_sources(
        &self,
        source: &crate::breakpoint::SourceKey,
    ) -> Vec<crate::breakpoint::SourceKey>;

    fn clear_disabled_source_maps(&self);

    fn disable_source_map_for_source(&self, source: &crate::breakpoint::SourceKey);

    fn source_map_timeouts(&self) -> SourceMapTimeouts;
}

/// The optional predictor peer (§6 "Predictor (optional peer) interface").
pub trait Predictor {
    async fn predict_breakpoints(&self, params: &PredictParams);

    async fn predicted_resolved_locations(&self, params: &PredictParams) -> Vec<PredictedLocation>;
}
