//! Process-wide tracing setup shared by the server and the admin CLI.

pub mod tracing;

/// Initialize tracing with JSON output.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init_with(tracing::LogFormat::Json);
}
