//! Tests for utility functions

use bounded_elastic::util::{init_tracing, init_tracing_with_filter, DEFAULT_FILTER};

#[test]
fn test_default_filter_targets_crate() {
    assert!(DEFAULT_FILTER.starts_with("bounded_elastic="));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    // A global subscriber is now installed, so an explicit filter is refused.
    assert!(!init_tracing_with_filter("bounded_elastic=debug"));
}
