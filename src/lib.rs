#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Lupin: keeps a session "active" by simulating human-looking pointer and keyboard use.
//!
//! The crate is organized around a small activity-simulation engine:
//! - `config`: Config draft/validated models, validation contract, persistence helpers.
//! - `scheduler`: The single-session loop owner (start/stop/status, engine events).
//! - `executor`: Per-tick action planning plus movement and typing synthesis.
//! - `input`: The input-injection capability (Enigo, dry-run, recording drivers).
//! - `control`: Message-passing front door to the scheduler.
//! - `sources`: Front ends that produce control messages (stdin).
//!
//! Use `lupin::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, validation, loader/store).
pub mod config;
/// Public module: control channel in front of the scheduler.
pub mod control;
/// Public module: action execution (planning, motion, typing).
pub mod executor;
/// Public module: input-injection drivers.
pub mod input;
/// Public module: session scheduling.
pub mod scheduler;
/// Public module: command sources (stdin).
pub mod sources;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a simple level name (trace|debug|info|warn|error).
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - `level` wins when given and valid.
/// - Otherwise honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::fmt;

    let level = level
        .and_then(parse_level)
        .or_else(|| std::env::var("RUST_LOG").ok().as_deref().and_then(parse_level))
        .unwrap_or(tracing::Level::INFO);

    // Logs go to stderr; stdout carries command replies.
    let _ = fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use lupin::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;

    // Engine surface
    pub use crate::config::{ConfigDraft, RestartPolicy};
    pub use crate::control::{ControlHandle, spawn_controller};
    pub use crate::input::{DryRunBackend, EnigoBackend, InputBackend};
    pub use crate::scheduler::{EngineEvent, RunState, Scheduler};

    // External crates (namespaced) if callers want direct access
    pub use crate as lupin;
    pub use enigo;
    pub use rand;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("WARNING"), Some(tracing::Level::WARN));
        assert_eq!(parse_level("trace"), Some(tracing::Level::TRACE));
        assert_eq!(parse_level("loud"), None);
    }
}
