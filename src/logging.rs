//! Diagnostic tracing for operators.
//!
//! - **Tracing (this module)**: diagnostics filtered by `RUST_LOG`, written to
//!   stderr. Not persisted.
//! - **Activity trail (`audit`)**: the JSON-lines record of every run. Always
//!   written, unaffected by `RUST_LOG`.

use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

/// Installs the global tracing subscriber.
///
/// Reads `RUST_LOG` and falls back to `default_directive` (for example
/// `warn`) when it is unset or invalid. Output is compact and goes to stderr.
///
/// ```bash
/// RUST_LOG=pipewright=debug cargo test
/// ```
///
/// # Errors
///
/// Returns [`TryInitError`] when a global subscriber is already installed;
/// the existing subscriber stays in place.
pub fn init(default_directive: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::init;

    #[test]
    fn second_install_is_refused() {
        init("warn").ok();
        assert!(init("debug").is_err());
    }
}
