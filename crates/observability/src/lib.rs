//! Process-wide logging setup shared by the binaries.

/// Tracing subscriber configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize logging using `LOG_FORMAT` and `RUST_LOG` from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    crate::tracing::init_with(LogFormat::from_env());
}

/// Initialize logging with an explicit output format.
pub fn init_with(format: LogFormat) {
    crate::tracing::init_with(format);
}
