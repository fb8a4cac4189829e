//! Command-line interface for the hybrid provider.
//!
//! # Commands
//!
//! - `request`: Route one JSON-RPC call and print the result
//! - `classify`: Show how a method would be routed
//! - `network`: Detect the read (and wallet) chain and validate it
//! - `watch`: Print wallet lifecycle events as the router re-emits them
//!
//! # Example
//!
//! ```bash
//! hybrid-provider classify eth_getBalance
//! hybrid-provider classify personal_sign --json
//! hybrid-provider request eth_getBalance '["0x0000000000000000000000000000000000000000", "latest"]'
//! hybrid-provider watch --heads
//! ```

use crate::config::Config;
use crate::error::{RouterError, RouterResult};
use crate::rpc::{
    listener, HttpBackend, HybridProvider, MethodTable, NetworkCache, ProviderEvent, Route,
    WebSocketBackend,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Hybrid read/write JSON-RPC provider
#[derive(Parser, Debug)]
#[command(name = "hybrid-provider")]
#[command(about = "Route JSON-RPC calls between a public endpoint and a wallet", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Route a single JSON-RPC call
    Request {
        /// RPC method name
        method: String,

        /// Parameters as JSON (array or object)
        #[arg(default_value = "[]")]
        params: String,
    },

    /// Show the category and backend for a method
    Classify {
        /// RPC method name
        method: String,

        /// Print the classification as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect the connected chain and validate it against EXPECTED_CHAIN_ID
    Network {
        /// Print detected networks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print wallet lifecycle events until Ctrl-C
    Watch {
        /// Also forward new heads as `message` events
        #[arg(long)]
        heads: bool,
    },
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - A backend cannot be created
/// - Command execution fails
pub async fn run() -> RouterResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Request { method, params } => run_request_command(&method, &params).await,
        Commands::Classify { method, json } => run_classify_command(&method, json),
        Commands::Network { json } => run_network_command(json).await,
        Commands::Watch { heads } => run_watch_command(heads).await,
    }
}

/// Build the router from configuration. The wallet is not connected yet.
async fn build_provider(config: &Config) -> RouterResult<(HybridProvider, Arc<WebSocketBackend>)> {
    let read = HttpBackend::connect(config.read_rpc_url()).await?;

    let wallet = Arc::new(WebSocketBackend::new(config.wallet_socket()?));
    let provider = HybridProvider::builder()
        .read(read)
        .write(Arc::clone(&wallet))
        .fallback(config.fallback())
        .build()?;

    Ok((provider, wallet))
}

/// Execute the request command.
async fn run_request_command(method: &str, params: &str) -> RouterResult<()> {
    let params: Value = serde_json::from_str(params).map_err(|e| {
        RouterError::config(format!("params must be valid JSON: {e}"), Some(Box::new(e)))
    })?;

    let config = Config::from_env()?;
    let (provider, wallet) = build_provider(&config).await?;
    wallet.open().await?;

    let route = provider.route_for(method);
    info!(method, route = route.as_str(), "Sending request");

    let result = provider.request(method, params).await?;

    println!(
        "{} {} {}",
        method.bold(),
        "via".dimmed(),
        route_label(route)
    );
    println!("{}", to_pretty(&result)?);

    Ok(())
}

/// Execute the classify command.
fn run_classify_command(method: &str, json: bool) -> RouterResult<()> {
    let table = MethodTable::default();

    if json {
        println!("{}", to_pretty(&classification_report(&table, method))?);
        return Ok(());
    }

    let class = table
        .classify(method)
        .map_or_else(|| "unclassified".yellow(), |c| c.as_str().normal());

    println!("{}", method.bold());
    println!("  category: {class}");
    println!("  backend:  {}", route_label(table.route(method)));
    Ok(())
}

/// JSON form of a classification; `category` is null for unlisted methods.
fn classification_report(table: &MethodTable, method: &str) -> Value {
    serde_json::json!({
        "method": method,
        "category": table.classify(method),
        "route": table.route(method),
    })
}

/// Execute the network command.
async fn run_network_command(json: bool) -> RouterResult<()> {
    let config = Config::from_env()?;
    let read = HttpBackend::connect(config.read_rpc_url()).await?;

    let read_cache = NetworkCache::new();
    let read_network = read_cache.detect(&read).await?;
    let mut wallet_network = None;

    if config.write_rpc_url().is_some() {
        let wallet = WebSocketBackend::new(config.wallet_socket()?);
        wallet.open().await?;
        wallet_network = Some(NetworkCache::new().detect(&wallet).await?);
        wallet.close().await;
    }

    if json {
        let report = serde_json::json!({ "read": read_network, "wallet": wallet_network });
        println!("{}", to_pretty(&report)?);
    } else {
        println!("{} {}", "read:  ".bold(), read_network);
        if let Some(wallet_network) = wallet_network {
            println!("{} {}", "wallet:".bold(), wallet_network);
        }
    }

    if let Some(wallet_network) = wallet_network.filter(|w| w.chain_id != read_network.chain_id) {
        warn!(
            read = read_network.chain_id,
            wallet = wallet_network.chain_id,
            "Read endpoint and wallet are on different chains"
        );
        println!("{}", "Read endpoint and wallet disagree on the chain".red().bold());
    }

    if let Some(expected) = config.expected_chain_id() {
        read_network.validate(expected)?;
        println!("{} chain {} as expected", "OK".green().bold(), expected);
    }

    Ok(())
}

/// Execute the watch command.
async fn run_watch_command(heads: bool) -> RouterResult<()> {
    let config = Config::from_env()?;
    let (provider, wallet) = build_provider(&config).await?;

    for event in ProviderEvent::ALL {
        provider.on(
            event,
            listener(move |payload| {
                println!("{} {}", event.as_str().cyan().bold(), payload);
                Ok(())
            }),
        );
    }

    // Listeners are in place, so the first `connect` is printed
    wallet.open().await?;

    if heads {
        wallet.forward_new_heads().await?;
    }

    println!("{}", "Watching wallet events, Ctrl-C to stop".dimmed());
    tokio::signal::ctrl_c().await.map_err(|e| {
        RouterError::config("failed to listen for Ctrl-C", Some(Box::new(e)))
    })?;

    wallet.close().await;
    info!("Watch stopped");
    Ok(())
}

fn to_pretty(value: &Value) -> RouterResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| RouterError::config("failed to render JSON output", Some(Box::new(e))))
}

fn route_label(route: Route) -> colored::ColoredString {
    match route {
        Route::Read => route.as_str().green(),
        Route::Write => route.as_str().magenta(),
    }
}
