//! Logging setup on top of `tracing` and `tracing-subscriber`.

use tracing_subscriber::{EnvFilter, fmt};

/// Initializes the global subscriber.
///
/// # Environment
/// - `RUST_LOG`: filter directive (default: `info`),
///   e.g. `RUST_LOG=debug` or `RUST_LOG=auto_pallet::packer=debug`
///
/// # Example
/// ```no_run
/// auto_pallet::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Subscriber for tests: debug level, captured by the test harness.
///
/// Safe to call from several tests.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
