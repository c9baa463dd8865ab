//! Integration tests for the marble engine.
//!
//! These tests drive the public surface the way a test author would: build
//! producers from diagrams, record streams under test, and settle
//! expectations through a full flush. They cover the interaction between
//! parser, scheduler, producers, comparator and harness rather than any one
//! of them in isolation.

#[path = "integration/end_to_end.rs"]
mod end_to_end;

#[path = "integration/notation_properties.rs"]
mod notation_properties;

#[path = "integration/producer_lifecycle.rs"]
mod producer_lifecycle;

#[path = "integration/subscription_tracking.rs"]
mod subscription_tracking;

/// Initializes test logging once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
