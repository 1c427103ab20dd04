//! Test log output
//!
//! Honors `RUST_LOG`; defaults to warnings from the strand crates only.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "strand_state=warn,strand_test=warn";

/// Install a test-friendly subscriber once per process. Later calls are no-ops.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
