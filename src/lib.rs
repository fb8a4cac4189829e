//! # Hybrid Provider
//!
//! A JSON-RPC provider that routes calls between a reliable public endpoint
//! ("read") and a wallet-supplied provider ("write"), built on
//! [Alloy](https://github.com/alloy-rs/alloy).
//!
//! Embedded wallets (mini-app wallets in particular) sign and submit
//! transactions fine but are unreliable for plain reads. The
//! [`HybridProvider`](rpc::HybridProvider) sends each method where it belongs
//! and looks like a single provider to its callers.
//!
//! ## Features
//!
//! - **Data-driven routing**: method classification is a table, not code
//! - **Single read fallback**: identity and network reads retry once on the wallet
//! - **No silent rerouting of writes**: transactions are never retried
//! - **Wallet lifecycle events**: `connect`, `disconnect`, `accountsChanged`,
//!   `chainChanged` and `message` re-emitted to the router's listeners
//! - **Network detection** with an explicit, clearable cache
//!
//! ## Architecture
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **RPC Layer** ([`rpc`]) - Backends, classification, routing and events
//! 3. **CLI Layer** ([`cli`]) - Command-line front end
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hybrid_provider::rpc::{HttpBackend, HybridProvider, WebSocketBackend};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = HybridProvider::builder()
//!         .read(HttpBackend::connect("https://mainnet.base.org").await?)
//!         .write(WebSocketBackend::connect("wss://wallet-bridge.example".to_string()).await?)
//!         .build()?;
//!
//!     // Served by the public endpoint
//!     let block = provider.request("eth_blockNumber", json!([])).await?;
//!
//!     // Served by the wallet
//!     let accounts = provider.request("eth_requestAccounts", json!([])).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::RouterResult<T>`](error::RouterResult).
//! Backend failures reach the caller unchanged as
//! [`RouterError::TransportError`](error::RouterError::TransportError).
//!
//! ## Testing
//!
//! ```bash
//! # All tests
//! cargo test
//!
//! # Tests that need live endpoints
//! READ_RPC_URL=... WRITE_RPC_URL=... cargo test -- --ignored
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod rpc;
