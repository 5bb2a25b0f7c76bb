#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Autoclick — condition-driven input automation.
//!
//! When a detector reports that a scenario's reference images match the screen,
//! the scenario's actions (taps, swipes, text input, system buttons, pauses) are
//! played back with their timing and delivered as callbacks to whoever injects
//! the input. Modules:
//! - `config`: Configuration models, loader, and schema helpers.
//! - `executor`: Effect types and the timed action executor.
//! - `bitmap`: Raw RGBA codec, `Condition_*` storage and the budgeted LRU cache.
//! - `runner`: Resolves a scenario's conditions and starts its actions.
//! - `sources`: Trigger sources (stdin).
//!
//! Use `autoclick::prelude::*` to bring commonly used items into scope quickly.

/// Public module: condition bitmaps (codec, storage, cache).
pub mod bitmap;
/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: execution engine (effects and executor).
pub mod executor;
/// Public module: scenario runner.
pub mod runner;
/// Public module: trigger sources.
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

/// Initialize tracing (logging) at `level`, or from `RUST_LOG`, falling back to `info`.
///
/// Logs go to stderr so stdout stays free for emitted effects.
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<tracing::Level>) {
    let level = level
        .or_else(|| std::env::var("RUST_LOG").ok().and_then(|s| parse_level(&s)))
        .unwrap_or(tracing::Level::INFO);

    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use autoclick::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use std::time::Duration;

    pub use crate::bitmap::{BitmapCache, BitmapStorage, CacheError, Image};
    pub use crate::config::{Action, ActionList, Button, Config};
    pub use crate::executor::{
        ActionExecutor, Effect, ExecutorError, ExecutorState, Gesture, Listeners, MainContext,
    };
    pub use crate::runner::Runner;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels() {
        assert_eq!(parse_level("WARN"), Some(tracing::Level::WARN));
        assert_eq!(parse_level("warning"), Some(tracing::Level::WARN));
        assert_eq!(parse_level("loud"), None);
        assert!(!version().is_empty());
    }
}
