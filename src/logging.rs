//! Diagnostic logging.
//!
//! Enable by setting environment variable: STORYTRAIL_LOG=debug
//! (any `EnvFilter` directive works, e.g. `storytrail::cache=debug`).
//! Logs go to stderr so they never mix with report output.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "STORYTRAIL_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Initialize logging. Call once at startup.
pub fn init() {
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
