//! Observability and structured logging infrastructure.
//!
//! Logging goes through the tracing framework. Routing decisions are logged
//! at `debug`, read failures and fallbacks at `warn`, wallet connection
//! changes at `info`.
//!
//! # Usage
//!
//! Initialize tracing at application startup:
//!
//! ```no_run
//! use hybrid_provider::observability;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keep the guard alive so buffered file logs are flushed on exit
//!     let _guard = observability::init_tracing(None, None, false)?;
//!
//!     // Run application...
//!     Ok(())
//! }
//! ```
//!
//! # Environment Configuration
//!
//! ```bash
//! # Follow every routing decision
//! RUST_LOG=hybrid_provider=debug cargo run -- request eth_chainId
//!
//! # Enable JSON output for production
//! LOG_JSON=true cargo run -- watch
//!
//! # Write logs to file with daily rotation
//! LOG_FILE=./logs/provider.log cargo run -- watch
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber with configurable output formats.
///
/// # Arguments
///
/// * `log_level` - Optional log level override (e.g., "debug", "info").
///   `RUST_LOG` takes precedence when set.
/// * `log_file` - Optional file path for log output. Enables daily log rotation.
/// * `json_output` - JSON console output when true, pretty output otherwise.
///
/// # Defaults
///
/// - Level: `info` for `hybrid_provider`, `warn` for dependencies
/// - Format: Pretty-printed with colors and timestamps
/// - Output: Console only (no file)
///
/// # Returns
///
/// The file writer guard when file logging is enabled. Dropping it stops the
/// background writer.
///
/// # Errors
///
/// Returns an error if:
/// - The log directory cannot be created
/// - A global subscriber is already installed
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else if let Some(level) = log_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new("hybrid_provider=info,warn")
    };

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(ref path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("provider.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // File output is always JSON
        let layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized successfully"
    );

    Ok(guard)
}

/// Initialize tracing for tests.
///
/// Output goes to the test harness; see it with `cargo test -- --nocapture`.
#[cfg(test)]
pub fn init_test_tracing() {
    use tracing_subscriber::fmt::format::FmtSpan;

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_span_events(FmtSpan::CLOSE)
        .pretty()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_fails() {
        init_test_tracing();
        // A global subscriber is already installed by the line above
        let result = init_tracing(Some("debug".to_string()), None, false);
        assert!(result.is_err());
    }
}
