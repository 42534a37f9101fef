//! Structured logging setup.
//!
//! Thin wrapper over `tracing-subscriber` so binaries and tests can wire
//! up output with one call. Safe to call more than once; only the first
//! initialisation wins.

use std::str::FromStr;
use tracing::Level;

/// Initialise console logging at `info`.
pub fn init() {
    init_with_level("info");
}

/// Initialise console logging at the given level. Unknown level strings
/// fall back to `info`.
pub fn init_with_level(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
