//! Telemetry helpers for structured logging of scheduler events.
//!
//! The scheduler only emits `tracing` events. Applications that already
//! install a subscriber can ignore this module.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: scheduler lifecycle at info.
pub const DEFAULT_FILTER: &str = "bounded_elastic=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`]. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Install a fmt subscriber with explicit filter `directives`,
/// e.g. `"bounded_elastic=debug"`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing_with_filter(directives: &str) -> bool {
    install(EnvFilter::new(directives))
}

fn install(filter: EnvFilter) -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
