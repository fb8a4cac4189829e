//! Hybrid provider that routes requests between a read and a write backend.
//!
//! Some wallet environments (embedded mini-app wallets in particular) cannot
//! serve read-only calls reliably. [`HybridProvider`] presents one request
//! surface and sends each call where it belongs.
//!
//! # Routing Strategy
//!
//! - **Pure reads**: read backend. If it fails and the method is on the
//!   fallback allow-list, the wallet gets exactly one retry. If the retry
//!   fails too, the caller sees the original read error.
//! - **Transaction and write methods**: wallet, no retry, no fallback.
//! - **Unknown methods**: wallet.
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_provider::rpc::{HttpBackend, HybridProvider, WebSocketBackend};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let read = HttpBackend::connect("https://mainnet.base.org").await?;
//!     let write = WebSocketBackend::connect("wss://wallet-bridge.example".to_string()).await?;
//!
//!     let provider = HybridProvider::builder().read(read).write(write).build()?;
//!
//!     let balance = provider
//!         .request("eth_getBalance", json!(["0x0000000000000000000000000000000000000000", "latest"]))
//!         .await?;
//!     println!("Balance: {balance}");
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::backend::{RequestProvider, WalletProvider};
use super::classify::{FallbackList, MethodTable, Route};
use super::events::{listener, Listener, ListenerRegistry, ProviderEvent};
use crate::error::{RouterError, RouterResult};

/// Router over a read backend and a wallet (write) backend.
///
/// # Architecture
///
/// ```text
/// HybridProvider
/// ├─ read backend  (public RPC endpoint)
/// │  └─ For: pure reads
/// ├─ write backend (wallet provider)
/// │  └─ For: transactions, signing, unknown methods, read fallback
/// └─ listener registry
///    └─ Re-emits the wallet's lifecycle events
/// ```
pub struct HybridProvider {
    read: Arc<dyn RequestProvider>,
    write: Arc<dyn WalletProvider>,
    table: MethodTable,
    fallback: FallbackList,
    listeners: Arc<ListenerRegistry>,
    forwarders: Vec<(ProviderEvent, Listener)>,
}

impl HybridProvider {
    /// Starts building a router.
    #[must_use]
    pub fn builder() -> HybridProviderBuilder {
        HybridProviderBuilder::default()
    }

    /// Creates a router with the default method table and fallback list.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `write` is `None`: writes have no
    /// reasonable fallback.
    pub fn new(
        read: Arc<dyn RequestProvider>,
        write: Option<Arc<dyn WalletProvider>>,
    ) -> RouterResult<Self> {
        let write = write.ok_or_else(|| {
            RouterError::config("a write backend is required to build the router", None)
        })?;
        Ok(Self::assemble(
            read,
            write,
            MethodTable::default(),
            FallbackList::default(),
        ))
    }

    fn assemble(
        read: Arc<dyn RequestProvider>,
        write: Arc<dyn WalletProvider>,
        table: MethodTable,
        fallback: FallbackList,
    ) -> Self {
        let listeners = Arc::new(ListenerRegistry::new());
        let forwarders = ProviderEvent::ALL
            .into_iter()
            .map(|event| {
                let forwarder = forwarder(Arc::downgrade(&listeners), event);
                write.on_event(event.as_str(), Arc::clone(&forwarder));
                (event, forwarder)
            })
            .collect();

        Self {
            read,
            write,
            table,
            fallback,
            listeners,
            forwarders,
        }
    }

    /// Sends `method` to the backend selected by the method table.
    ///
    /// Returns exactly what that backend returned.
    ///
    /// # Errors
    ///
    /// Propagates the backend error unchanged. For an allow-listed read whose
    /// wallet retry also fails, the original read error is returned.
    pub async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        let route = self.table.route(method);
        debug!(method, route = route.as_str(), "Routing request");

        match route {
            Route::Write => self.write.request(method, params).await,
            Route::Read => self.request_read(method, params).await,
        }
    }

    async fn request_read(&self, method: &str, params: Value) -> RouterResult<Value> {
        // Params are kept for a possible retry on the wallet
        let retry_params = self.fallback.allows(method).then(|| params.clone());

        let read_error = match self.read.request(method, params).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let Some(params) = retry_params else {
            debug!(method, error = %read_error, "Read backend failed, no fallback for method");
            return Err(read_error);
        };

        warn!(method, error = %read_error, "Read backend failed, retrying on write backend");
        match self.write.request(method, params).await {
            Ok(result) => Ok(result),
            Err(fallback_error) => {
                warn!(
                    method,
                    error = %fallback_error,
                    "Write backend fallback failed, returning read error"
                );
                Err(read_error)
            }
        }
    }

    /// Backend `method` would be sent to.
    #[must_use]
    pub fn route_for(&self, method: &str) -> Route {
        self.table.route(method)
    }

    /// Method classification in use.
    #[must_use]
    pub const fn table(&self) -> &MethodTable {
        &self.table
    }

    /// Read methods allowed to retry on the wallet.
    #[must_use]
    pub const fn fallback(&self) -> &FallbackList {
        &self.fallback
    }

    /// Registers `listener` for `event`. Returns `self` for chaining.
    pub fn on(&self, event: impl AsRef<str>, listener: Listener) -> &Self {
        self.listeners.on(event.as_ref(), listener);
        self
    }

    /// Registers `listener` for a single delivery of `event`.
    pub fn once(&self, event: impl AsRef<str>, listener: Listener) -> &Self {
        self.listeners.once(event.as_ref(), listener);
        self
    }

    /// Removes the first registration of `listener` for `event`.
    pub fn remove_listener(&self, event: impl AsRef<str>, listener: &Listener) -> &Self {
        self.listeners.remove(event.as_ref(), listener);
        self
    }

    /// Clears listeners for `event`, or for every event when `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) -> &Self {
        self.listeners.clear(event);
        self
    }

    /// Delivers `payload` to this router's listeners for `event`.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: impl AsRef<str>, payload: &Value) -> usize {
        self.listeners.emit(event.as_ref(), payload)
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: impl AsRef<str>) -> usize {
        self.listeners.count(event.as_ref())
    }
}

fn forwarder(registry: Weak<ListenerRegistry>, event: ProviderEvent) -> Listener {
    listener(move |payload| {
        if let Some(registry) = registry.upgrade() {
            registry.emit(event.as_str(), payload);
        }
        Ok(())
    })
}

impl Drop for HybridProvider {
    fn drop(&mut self) {
        for (event, forwarder) in &self.forwarders {
            self.write.remove_event_listener(event.as_str(), forwarder);
        }
        self.listeners.clear(None);
    }
}

impl std::fmt::Debug for HybridProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridProvider")
            .field("table", &self.table.len())
            .field("fallback", &self.fallback.methods())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestProvider for HybridProvider {
    async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        Self::request(self, method, params).await
    }
}

impl WalletProvider for HybridProvider {
    fn on_event(&self, event: &str, listener: Listener) {
        self.on(event, listener);
    }

    fn remove_event_listener(&self, event: &str, listener: &Listener) {
        self.remove_listener(event, listener);
    }
}

/// Builder for [`HybridProvider`].
#[derive(Default)]
pub struct HybridProviderBuilder {
    read: Option<Arc<dyn RequestProvider>>,
    write: Option<Arc<dyn WalletProvider>>,
    table: Option<MethodTable>,
    fallback: Option<FallbackList>,
}

impl HybridProviderBuilder {
    /// Sets the read backend.
    #[must_use]
    pub fn read(mut self, read: impl RequestProvider + 'static) -> Self {
        self.read = Some(Arc::new(read));
        self
    }

    /// Sets the write (wallet) backend.
    #[must_use]
    pub fn write(mut self, write: impl WalletProvider + 'static) -> Self {
        self.write = Some(Arc::new(write));
        self
    }

    /// Replaces the default method table.
    #[must_use]
    pub fn table(mut self, table: MethodTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Replaces the default fallback allow-list.
    #[must_use]
    pub fn fallback(mut self, fallback: FallbackList) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Builds the router and subscribes to the wallet's lifecycle events.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either backend is missing.
    pub fn build(self) -> RouterResult<HybridProvider> {
        let read = self.read.ok_or_else(|| {
            RouterError::config("a read backend is required to build the router", None)
        })?;
        let write = self.write.ok_or_else(|| {
            RouterError::config("a write backend is required to build the router", None)
        })?;

        Ok(HybridProvider::assemble(
            read,
            write,
            self.table.unwrap_or_default(),
            self.fallback.unwrap_or_default(),
        ))
    }
}
