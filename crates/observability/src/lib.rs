//! Tracing/logging setup shared by keygate binaries.

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use self::tracing::{LogConfig, LogFormat, ParseLogFormatError};

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) {
    self::tracing::init(config);
}
