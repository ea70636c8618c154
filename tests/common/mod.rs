//! Shared helpers for integration tests

pub mod graph_builder;

/// Route engine traces to the test writer; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
