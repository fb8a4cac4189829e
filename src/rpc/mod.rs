//! Request routing between a read endpoint and a wallet provider.
//!
//! # Provider Types
//!
//! - **HTTP Backend** ([`http`]): public JSON-RPC endpoint for reads
//! - **WebSocket Backend** ([`websocket`]): wallet bridge for writes, with
//!   lifecycle events and reconnection
//! - **Hybrid Provider** ([`hybrid`]): the router that owns both
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │           HybridProvider            │
//! │  (method table + fallback list)     │
//! └─────────────────────────────────────┘
//!          │                    │
//!          ├────────────────────┤
//!          │                    │
//!    ┌─────▼─────┐        ┌────▼─────┐
//!    │   Read    │        │  Write   │
//!    │ (HTTP)    │        │ (wallet) │
//!    └───────────┘        └──────────┘
//!         │                     │
//!     Pure reads        Transactions, signing,
//!                       unknown methods, events
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use hybrid_provider::rpc::{listener, HttpBackend, HybridProvider, ProviderEvent, WebSocketBackend};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = HybridProvider::builder()
//!     .read(HttpBackend::connect("https://mainnet.base.org").await?)
//!     .write(WebSocketBackend::connect("wss://wallet-bridge.example".to_string()).await?)
//!     .build()?;
//!
//! provider.on(ProviderEvent::ChainChanged, listener(|chain| {
//!     println!("Chain changed to {chain}");
//!     Ok(())
//! }));
//!
//! let hash = provider.request("eth_sendTransaction", json!([{ "to": "0x..." }])).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod classify;
pub mod events;
pub mod http;
pub mod hybrid;
pub mod network;
pub mod websocket;

// Re-export commonly used types
pub use backend::{RequestProvider, WalletProvider};
pub use classify::{FallbackList, MethodClass, MethodTable, Route};
pub use events::{listener, Listener, ListenerRegistry, ProviderEvent};
pub use http::HttpBackend;
pub use hybrid::{HybridProvider, HybridProviderBuilder};
pub use network::{NetworkCache, NetworkInfo};
pub use websocket::{ReconnectingWebSocket, WebSocketBackend, WebSocketProvider};
