//! Logging setup for the command-line front end

use tracing_subscriber::prelude::*;

/// Initialize logging
///
/// Behavior:
/// - If RUST_LOG is not set, set a helpful default.
/// - Log lines go to stderr so stdout only carries responses.
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup, before the runtime is built
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var("RUST_LOG", "debug,gpx_catalog_lib=debug");
            } else {
                std::env::set_var("RUST_LOG", "warn,gpx_catalog=info,gpx_catalog_lib=info");
            }
        }
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();

    if defaulted {
        tracing::debug!(
            "RUST_LOG set to default: {}",
            std::env::var("RUST_LOG").unwrap_or_default()
        );
    }
    tracing::debug!(
        "{} {} starting",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
}
