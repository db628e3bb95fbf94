//! A breakpoint coordination core: the part of a JavaScript/WebAssembly
//! debug adapter that keeps one logical, IDE-facing breakpoint (DAP) in
//! sync with however many runtime installations (CDP) are needed to hit
//! it, across source maps, module reloads, and the pause-or-continue
//! decision each CDP pause event requires.
//!
//! The crate bridges two protocols with different coordinate conventions
//! ([`protocol`]: DAP is 1-based, CDP is 0-based) through a single owning
//! [`manager::BreakpointManager`], generic over three peer traits
//! ([`peers`]) so the runtime connection, the source container, and the
//! optional location predictor can be supplied by the embedding adapter
//! without this crate depending on their concrete types.

pub mod breakpoint;
pub mod condition;
pub mod config;
pub mod error;
pub mod hit_condition;
pub mod launch;
pub mod manager;
pub mod pause;
pub mod peers;
pub mod protocol;
pub mod source_map;
pub mod statistics;

pub use breakpoint::{Breakpoint, BreakpointKind, EntryBreakpointMode, SourceKey};
pub use config::ManagerConfig;
pub use error::BreakpointError;
pub use manager::{BreakpointManager, PauseEvent, ResolverRegistry};
pub use pause::PauseVerdict;
