//! Error kinds for the breakpoint coordination core.
//!
//! Most of these are caught at the call site per the propagation policy: an
//! invalid hit condition degrades one breakpoint to [`crate::breakpoint::BreakpointKind::NeverResolved`]
//! rather than failing the whole `setBreakpoints` request, and a failed CDP
//! install is logged and simply omitted from that breakpoint's references.

use thiserror::Error;

/// Errors surfaced by the breakpoint coordination core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BreakpointError {
    /// A `hitCondition` string did not match the accepted grammar.
    #[error("invalid hit condition: {0}")]
    InvalidHitCondition(String),

    /// A `logMessage` template had unbalanced `{`/`}` or an empty expression.
    #[error("invalid log message: {0}")]
    InvalidLogMessage(String),

    /// The runtime rejected or failed to answer a `Debugger.*` request.
    #[error("CDP request failed: {0}")]
    CdpRequestFailed(String),

    /// A source-map handler wait exceeded its budget.
    #[error("source map handler timed out after {elapsed_ms}ms")]
    SourceMapTimeout {
        /// Milliseconds actually waited before giving up.
        elapsed_ms: u64,
    },

    /// Lookup by DAP id or CDP id found nothing.
    #[error("breakpoint not found: {0}")]
    BreakpointNotFound(String),

    /// `setBreakpoints` referenced a source the container could not resolve.
    #[error("unknown source: {0}")]
    UnknownSource(String),
}
