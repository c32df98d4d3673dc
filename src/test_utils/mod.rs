pub mod fixtures;
pub mod roller;

pub use roller::FixedRoller;

use tracing_subscriber::EnvFilter;

/// Call at the top of a test to surface engine debug logs via `RUST_LOG`.
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
