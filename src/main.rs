//! CLI entry point for the hybrid provider.
//!
//! # Layer Separation
//!
//! - **main.rs**: Async runtime + tracing initialization only
//! - **CLI module**: User interface + layer orchestration
//! - **Core modules**: Independent, reusable, no upward dependencies

use hybrid_provider::{cli, observability};
use tracing::error;

/// Entry point for the hybrid provider CLI.
///
/// Logging is controlled by `RUST_LOG`, `LOG_JSON` and `LOG_FILE`:
///
/// ```text
/// RUST_LOG=hybrid_provider=debug hybrid-provider request eth_chainId
/// LOG_JSON=true LOG_FILE=./logs/provider.log hybrid-provider watch
/// ```
#[tokio::main]
async fn main() {
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    // Held until exit so file logs are flushed
    let _log_guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
