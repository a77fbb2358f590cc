//! Logging setup utilities for the Haiso binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The filter covers the library crates and the calling binary. `RUST_LOG`
/// overrides the default when set.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "haiso-server", "haiso-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use haiso_shared::logger::setup_logger;
///
/// setup_logger("haiso-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    let binary_target = binary_name.replace('-', "_");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "haiso_server={level},haiso_client={level},haiso_shared={level},{bin}={level},tower_http=info",
                    level = default_log_level,
                    bin = binary_target,
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
