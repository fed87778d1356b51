//! Process-wide tracing setup for hosts embedding gatehouse.

/// Initialize process-wide tracing.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LOG_FORMAT_ENV, LogFormat};
