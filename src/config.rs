//! Configuration management for the hybrid provider.
//!
//! This module loads and validates configuration from environment variables
//! using the `dotenvy` crate. All operations return [`RouterResult`].
//!
//! ## Environment Variables
//!
//! Required:
//! - `READ_RPC_URL`: HTTP(S) endpoint serving pure reads
//!
//! Optional (with defaults):
//! - `WRITE_RPC_URL`: WebSocket endpoint of the wallet bridge (no default)
//! - `FALLBACK_METHODS`: comma-separated reads the wallet may retry
//!   (default: `eth_chainId,eth_accounts,net_version`)
//! - `EXPECTED_CHAIN_ID`: chain the providers must be on (no default)
//! - `WS_MAX_RECONNECT_ATTEMPTS`: wallet reconnection attempts (default: 10)
//! - `WS_INITIAL_DELAY_SECS`: first reconnection delay, at most
//!   `WS_MAX_DELAY_SECS` (default: 1)
//! - `WS_MAX_DELAY_SECS`: reconnection delay cap (default: 60)
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use hybrid_provider::config::Config;
//! use hybrid_provider::error::RouterResult;
//!
//! # fn main() -> RouterResult<()> {
//! let config = Config::from_env()?;
//! println!("Read endpoint: {}", config.read_rpc_url());
//! # Ok(())
//! # }
//! ```

use crate::error::{RouterError, RouterResult};
use crate::rpc::classify::{FallbackList, DEFAULT_FALLBACK_METHODS};
use crate::rpc::websocket::ReconnectingWebSocket;
use std::env;
use std::str::FromStr;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Read endpoint
    read_rpc_url: String,

    /// Wallet bridge endpoint
    write_rpc_url: Option<String>,

    /// Reads the wallet may retry
    fallback_methods: Vec<String>,

    /// Chain the providers must be on
    expected_chain_id: Option<u64>,

    /// Wallet reconnection attempts
    ws_max_reconnect_attempts: u32,

    /// First reconnection delay in seconds
    ws_initial_delay_secs: u64,

    /// Reconnection delay cap in seconds
    ws_max_delay_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads and validates all environment variables
    /// 3. Applies defaults for optional variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `READ_RPC_URL` is missing or not an http(s) URL
    /// - `WRITE_RPC_URL` is set but not a ws(s) URL
    /// - A numeric variable does not parse
    /// - `WS_INITIAL_DELAY_SECS` is larger than `WS_MAX_DELAY_SECS`
    pub fn from_env() -> RouterResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let read_rpc_url = env::var("READ_RPC_URL").map_err(|e| {
            RouterError::config(
                "READ_RPC_URL environment variable is required",
                Some(Box::new(e)),
            )
        })?;
        if !(read_rpc_url.starts_with("http://") || read_rpc_url.starts_with("https://")) {
            return Err(RouterError::config(
                format!("READ_RPC_URL must be an http(s) URL, got: {read_rpc_url}"),
                None,
            ));
        }

        let write_rpc_url = env::var("WRITE_RPC_URL").ok().filter(|url| !url.is_empty());
        if let Some(url) = &write_rpc_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(RouterError::config(
                    format!("WRITE_RPC_URL must be a ws(s) URL, got: {url}"),
                    None,
                ));
            }
        }

        let fallback_methods = env::var("FALLBACK_METHODS").map_or_else(
            |_| {
                DEFAULT_FALLBACK_METHODS
                    .iter()
                    .map(|m| (*m).to_string())
                    .collect()
            },
            |raw| parse_method_list(&raw),
        );

        let expected_chain_id = env::var("EXPECTED_CHAIN_ID")
            .ok()
            .map(|raw| parse_var::<u64>("EXPECTED_CHAIN_ID", &raw))
            .transpose()?;

        let ws_max_reconnect_attempts = var_or("WS_MAX_RECONNECT_ATTEMPTS", 10)?;
        if ws_max_reconnect_attempts == 0 {
            return Err(RouterError::config(
                "WS_MAX_RECONNECT_ATTEMPTS must be at least 1",
                None,
            ));
        }
        let ws_initial_delay_secs = var_or("WS_INITIAL_DELAY_SECS", 1)?;
        let ws_max_delay_secs = var_or("WS_MAX_DELAY_SECS", 60)?;
        if ws_initial_delay_secs > ws_max_delay_secs {
            return Err(RouterError::config(
                format!(
                    "WS_INITIAL_DELAY_SECS must not exceed WS_MAX_DELAY_SECS, \
                     got {ws_initial_delay_secs} > {ws_max_delay_secs}"
                ),
                None,
            ));
        }

        Ok(Self {
            read_rpc_url,
            write_rpc_url,
            fallback_methods,
            expected_chain_id,
            ws_max_reconnect_attempts,
            ws_initial_delay_secs,
            ws_max_delay_secs,
        })
    }

    /// Get the read endpoint.
    #[must_use]
    pub fn read_rpc_url(&self) -> &str {
        &self.read_rpc_url
    }

    /// Get the wallet bridge endpoint, if configured.
    #[must_use]
    pub fn write_rpc_url(&self) -> Option<&str> {
        self.write_rpc_url.as_deref()
    }

    /// Get the wallet bridge endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `WRITE_RPC_URL` is not set.
    pub fn require_write_rpc_url(&self) -> RouterResult<&str> {
        self.write_rpc_url().ok_or_else(|| {
            RouterError::config("WRITE_RPC_URL is required for this command", None)
        })
    }

    /// Get the fallback allow-list.
    #[must_use]
    pub fn fallback(&self) -> FallbackList {
        FallbackList::new(self.fallback_methods.iter().cloned())
    }

    /// Get the expected chain id, if configured.
    #[must_use]
    pub const fn expected_chain_id(&self) -> Option<u64> {
        self.expected_chain_id
    }

    /// Build a reconnecting socket for the wallet endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `WRITE_RPC_URL` is not set.
    pub fn wallet_socket(&self) -> RouterResult<ReconnectingWebSocket> {
        Ok(ReconnectingWebSocket::with_settings(
            self.require_write_rpc_url()?.to_string(),
            self.ws_max_reconnect_attempts,
            self.ws_initial_delay_secs,
            self.ws_max_delay_secs,
        ))
    }
}

/// Splits a comma-separated method list, dropping blanks.
fn parse_method_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_var<T>(name: &str, raw: &str) -> RouterResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim().parse::<T>().map_err(|e| {
        RouterError::config(
            format!("{name} must be a valid number, got: {raw}"),
            Some(Box::new(e)),
        )
    })
}

fn var_or<T>(name: &str, default: T) -> RouterResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name).map_or(Ok(default), |raw| parse_var(name, &raw))
}
