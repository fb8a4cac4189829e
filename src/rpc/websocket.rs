//! WebSocket write backend.
//!
//! Talks to a wallet bridge (or any signing node) over a WebSocket and
//! reports its connection lifecycle as provider events, the way injected
//! browser wallets do.
//!
//! # Events
//!
//! - `connect` with `{ "chainId": "0x.." }` after every successful connection
//! - `disconnect` with `{ "code": 4900, "message": .. }` when the connection is
//!   dropped for a reconnect or a head subscription ends
//! - `chainChanged` with the new hex chain id when a reconnect lands on
//!   another chain
//! - `message` with `{ "type": "eth_subscription", "data": .. }` for every new
//!   head while [`WebSocketBackend::forward_new_heads`] is active
//!
//! # Reconnection
//!
//! [`ReconnectingWebSocket`] retries with exponential backoff and ±25% jitter.
//! Requests never reconnect implicitly: a request made while disconnected
//! fails and the caller decides whether to call [`WebSocketBackend::reconnect`].

use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::BoxTransport;
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::backend::{RequestProvider, WalletProvider};
use super::events::{Listener, ListenerRegistry, ProviderEvent};
use super::http::{normalize_params, redact_url, transport_error};
use super::network::decode_chain_id;
use crate::error::{RouterError, RouterResult};

/// EIP-1193 code for "provider is disconnected from all chains".
pub const DISCONNECTED_CODE: i64 = 4900;

/// Single WebSocket connection to a JSON-RPC endpoint.
#[derive(Clone)]
pub struct WebSocketProvider {
    provider: RootProvider<BoxTransport>,
    url: String,
}

impl WebSocketProvider {
    /// Connects to a WebSocket RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - WebSocket connection fails
    /// - URL is invalid
    #[instrument(skip(ws_url), fields(ws_host = tracing::field::Empty, duration_ms = tracing::field::Empty))]
    pub async fn connect(ws_url: String) -> RouterResult<Self> {
        let host = redact_url(&ws_url);
        tracing::Span::current().record("ws_host", host.as_str());

        info!(ws_host = %host, "Connecting to WebSocket");

        let start = std::time::Instant::now();

        let provider = ProviderBuilder::new()
            .on_builtin(&ws_url)
            .await
            .map_err(|e| {
                error!(error = %e, ws_host = %host, "WebSocket connection failed");
                RouterError::websocket_connection(
                    format!("failed to connect to {host}: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        let duration = start.elapsed();
        tracing::Span::current().record("duration_ms", duration.as_millis() as u64);

        info!(
            ws_host = %host,
            duration_ms = duration.as_millis(),
            "WebSocket connected successfully"
        );

        Ok(Self {
            provider,
            url: ws_url,
        })
    }

    /// Returns a reference to the underlying Alloy provider.
    pub const fn provider(&self) -> &RootProvider<BoxTransport> {
        &self.provider
    }

    /// Returns the WebSocket URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends a raw JSON-RPC request over this connection.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    pub async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        self.provider
            .raw_request::<_, Value>(Cow::Owned(method.to_owned()), normalize_params(params))
            .await
            .map_err(|e| transport_error(method, e))
    }
}

impl std::fmt::Debug for WebSocketProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketProvider")
            .field("host", &redact_url(&self.url))
            .finish_non_exhaustive()
    }
}

/// Reconnecting WebSocket provider with exponential backoff.
#[derive(Debug)]
pub struct ReconnectingWebSocket {
    url: String,
    provider: Option<WebSocketProvider>,
    max_reconnect_attempts: u32,
    initial_delay_secs: u64,
    max_delay_secs: u64,
}

impl ReconnectingWebSocket {
    /// Creates a new reconnecting WebSocket with default settings.
    ///
    /// # Default Settings
    ///
    /// - Max reconnect attempts: 10
    /// - Initial delay: 1 second
    /// - Max delay: 60 seconds
    pub const fn new(url: String) -> Self {
        Self::with_settings(url, 10, 1, 60)
    }

    /// Creates a new reconnecting WebSocket with custom settings.
    pub const fn with_settings(
        url: String,
        max_reconnect_attempts: u32,
        initial_delay_secs: u64,
        max_delay_secs: u64,
    ) -> Self {
        Self {
            url,
            provider: None,
            max_reconnect_attempts,
            initial_delay_secs,
            max_delay_secs,
        }
    }

    /// Connects with automatic retry on failure.
    ///
    /// Delays double after each failed attempt up to `max_delay_secs`, with
    /// ±25% jitter.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MaxReconnectAttemptsExceeded`] once every
    /// attempt has failed.
    pub async fn connect(&mut self) -> RouterResult<()> {
        let mut attempt = 0;
        let mut delay = std::time::Duration::from_secs(
            self.initial_delay_secs.min(self.max_delay_secs),
        );

        loop {
            match WebSocketProvider::connect(self.url.clone()).await {
                Ok(provider) => {
                    self.provider = Some(provider);
                    info!("WebSocket connection established");
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_reconnect_attempts {
                        error!(
                            attempts = attempt,
                            "Max reconnection attempts reached"
                        );
                        return Err(RouterError::max_reconnect_exceeded(attempt, e.to_string()));
                    }

                    warn!(
                        "WebSocket connection failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt, self.max_reconnect_attempts, e, delay
                    );

                    tokio::time::sleep(delay).await;

                    delay = next_delay(delay, self.max_delay_secs, rand::random::<f64>());

                    debug!(
                        "Next retry attempt {} with delay {:?} (jitter applied)",
                        attempt + 1,
                        delay
                    );
                }
            }
        }
    }

    /// Drops the current connection and establishes a new one.
    ///
    /// # Errors
    ///
    /// Returns error if every reconnection attempt fails.
    pub async fn reconnect(&mut self) -> RouterResult<()> {
        warn!("Reconnecting WebSocket after disconnection...");
        self.provider = None;
        self.connect().await
    }

    /// Drops the current connection.
    pub fn disconnect(&mut self) {
        self.provider = None;
    }

    /// Returns the current provider, if connected.
    pub const fn provider(&self) -> Option<&WebSocketProvider> {
        self.provider.as_ref()
    }

    /// Checks if currently connected.
    pub const fn is_connected(&self) -> bool {
        self.provider.is_some()
    }

    /// Returns the WebSocket URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Doubles `delay` up to `max_delay_secs`, then applies ±25% jitter.
///
/// `random` is a sample in `[0, 1)`. Saturates instead of overflowing.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn next_delay(delay: std::time::Duration, max_delay_secs: u64, random: f64) -> std::time::Duration {
    let capped = std::cmp::min(
        delay.saturating_mul(2),
        std::time::Duration::from_secs(max_delay_secs),
    );
    let jitter_factor = 0.5 * (random - 0.5);
    let jitter_ms = (capped.as_millis() as f64 * jitter_factor).round() as i64;
    if jitter_ms >= 0 {
        capped.saturating_add(std::time::Duration::from_millis(jitter_ms as u64))
    } else {
        capped.saturating_sub(std::time::Duration::from_millis(jitter_ms.unsigned_abs()))
    }
}

/// Wallet backend over a reconnecting WebSocket.
///
/// Requests only read the published connection and never wait for a connect
/// or reconnect in progress: while one runs, they fail as disconnected.
pub struct WebSocketBackend {
    /// Held for the whole connect loop; serializes open, reconnect and close
    socket: tokio::sync::Mutex<ReconnectingWebSocket>,
    /// Live connection, locked only to clone or swap it
    connection: Mutex<Option<WebSocketProvider>>,
    events: Arc<ListenerRegistry>,
    chain_id: Mutex<Option<String>>,
    heads: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketBackend {
    /// Wraps `socket` without connecting.
    pub fn new(socket: ReconnectingWebSocket) -> Self {
        Self {
            socket: tokio::sync::Mutex::new(socket),
            connection: Mutex::new(None),
            events: Arc::new(ListenerRegistry::new()),
            chain_id: Mutex::new(None),
            heads: Mutex::new(None),
        }
    }

    /// Creates a backend for `url` with default reconnection settings and
    /// connects it.
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be established.
    pub async fn connect(url: String) -> RouterResult<Self> {
        let backend = Self::new(ReconnectingWebSocket::new(url));
        backend.open().await?;
        Ok(backend)
    }

    /// Connects (if needed) and announces the connection.
    ///
    /// Emits `connect`, and `chainChanged` if the chain differs from the one
    /// seen on the previous connection.
    ///
    /// # Errors
    ///
    /// Returns error if the connection or the chain id query fails.
    pub async fn open(&self) -> RouterResult<()> {
        let provider = {
            let mut socket = self.socket.lock().await;
            if !socket.is_connected() {
                socket.connect().await?;
            }
            socket
                .provider()
                .cloned()
                .ok_or_else(|| {
                    RouterError::websocket_disconnected("connection lost while opening")
                })?
        };
        self.publish(Some(provider.clone()));
        self.announce(&provider).await
    }

    /// Emits `disconnect`, then reconnects and announces the new connection.
    ///
    /// Head forwarding is stopped and must be restarted by the caller.
    ///
    /// # Errors
    ///
    /// Returns error if every reconnection attempt fails.
    pub async fn reconnect(&self) -> RouterResult<()> {
        self.stop_heads();
        self.publish(None);
        self.events.emit(
            ProviderEvent::Disconnect.as_str(),
            &disconnect_payload("reconnecting"),
        );

        let provider = {
            let mut socket = self.socket.lock().await;
            socket.reconnect().await?;
            socket
                .provider()
                .cloned()
                .ok_or_else(|| {
                    RouterError::websocket_disconnected("connection lost while reconnecting")
                })?
        };
        self.publish(Some(provider.clone()));
        self.announce(&provider).await
    }

    /// Closes the connection and emits `disconnect`.
    pub async fn close(&self) {
        self.stop_heads();
        self.publish(None);
        self.socket.lock().await.disconnect();
        self.events.emit(
            ProviderEvent::Disconnect.as_str(),
            &disconnect_payload("closed"),
        );
    }

    fn publish(&self, provider: Option<WebSocketProvider>) {
        *self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = provider;
    }

    fn current(&self) -> Option<WebSocketProvider> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn announce(&self, provider: &WebSocketProvider) -> RouterResult<()> {
        let chain_id = provider.request("eth_chainId", Value::Array(vec![])).await?;
        let numeric = decode_chain_id(&chain_id)?;
        let chain_hex = format!("{numeric:#x}");

        let previous = self
            .chain_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(chain_hex.clone());

        info!(chain_id = numeric, "Wallet backend connected");
        self.events.emit(
            ProviderEvent::Connect.as_str(),
            &json!({ "chainId": chain_hex }),
        );

        if let Some(previous) = previous.filter(|p| *p != chain_hex) {
            info!(from = %previous, to = %chain_hex, "Wallet backend chain changed");
            self.events
                .emit(ProviderEvent::ChainChanged.as_str(), &Value::from(chain_hex));
        }

        Ok(())
    }

    /// Subscribes to new heads and emits each one as a `message` event.
    ///
    /// Replaces any previous head subscription. When the subscription ends
    /// the backend emits `disconnect`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is not connected or the endpoint rejects
    /// the subscription.
    pub async fn forward_new_heads(&self) -> RouterResult<()> {
        let provider = self
            .current()
            .ok_or_else(|| RouterError::websocket_disconnected("cannot subscribe to heads"))?;
        let sub = provider.provider().subscribe_blocks().await.map_err(|e| {
            error!(error = %e, "Head subscription failed");
            transport_error("eth_subscribe", e)
        })?;
        info!("Head subscription active");
        let events = Arc::clone(&self.events);

        let handle = tokio::spawn(async move {
            let mut stream = sub.into_stream();
            while let Some(header) = stream.next().await {
                let data = match serde_json::to_value(&header) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode head");
                        continue;
                    }
                };
                events.emit(
                    ProviderEvent::Message.as_str(),
                    &json!({
                        "type": "eth_subscription",
                        "data": { "subscription": "newHeads", "result": data },
                    }),
                );
            }

            warn!("Head subscription ended");
            events.emit(
                ProviderEvent::Disconnect.as_str(),
                &disconnect_payload("head subscription ended"),
            );
        });

        if let Some(previous) = self
            .heads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
        Ok(())
    }

    fn stop_heads(&self) {
        if let Some(handle) = self
            .heads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// Hex chain id seen on the last connection.
    #[must_use]
    pub fn chain_id(&self) -> Option<String> {
        self.chain_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Checks if a connection is currently published.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }
}

fn disconnect_payload(reason: &str) -> Value {
    json!({
        "code": DISCONNECTED_CODE,
        "message": format!("WebSocket disconnected: {reason}"),
    })
}

impl Drop for WebSocketBackend {
    fn drop(&mut self) {
        self.stop_heads();
    }
}

impl std::fmt::Debug for WebSocketBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketBackend")
            .field("chain_id", &self.chain_id())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestProvider for WebSocketBackend {
    #[instrument(skip(self, params))]
    async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        let Some(provider) = self.current() else {
            return Err(RouterError::transport(
                method,
                "wallet WebSocket is not connected",
                None,
            ));
        };

        let result = provider.request(method, params).await;
        if let Err(e) = &result {
            warn!(method, error = %e, "Wallet request failed");
        }
        result
    }
}

impl WalletProvider for WebSocketBackend {
    fn on_event(&self, event: &str, listener: Listener) {
        self.events.on(event, listener);
    }

    fn remove_event_listener(&self, event: &str, listener: &Listener) {
        self.events.remove(event, listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reconnecting_websocket_creation() {
        let reconnecting = ReconnectingWebSocket::new("wss://test.com".to_string());
        assert_eq!(reconnecting.url(), "wss://test.com");
        assert!(!reconnecting.is_connected());
        assert_eq!(reconnecting.max_reconnect_attempts, 10);
    }

    #[test]
    fn test_reconnecting_websocket_custom_settings() {
        let reconnecting =
            ReconnectingWebSocket::with_settings("wss://test.com".to_string(), 5, 2, 30);
        assert_eq!(reconnecting.max_reconnect_attempts, 5);
        assert_eq!(reconnecting.initial_delay_secs, 2);
        assert_eq!(reconnecting.max_delay_secs, 30);
    }

    #[test]
    fn test_next_delay_doubles_and_caps() {
        // random = 0.5 means no jitter
        assert_eq!(
            next_delay(Duration::from_secs(1), 60, 0.5),
            Duration::from_secs(2)
        );
        assert_eq!(
            next_delay(Duration::from_secs(40), 60, 0.5),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_next_delay_jitter_bounds() {
        let low = next_delay(Duration::from_secs(4), 60, 0.0);
        let high = next_delay(Duration::from_secs(4), 60, 0.999);
        assert_eq!(low, Duration::from_secs(6));
        assert!(high > Duration::from_secs(9));
        assert!(high <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_request_while_disconnected_fails() {
        let backend =
            WebSocketBackend::new(ReconnectingWebSocket::new("wss://test.com".to_string()));
        let result = backend.request("eth_sendTransaction", Value::Array(vec![])).await;
        assert!(matches!(result, Err(RouterError::TransportError { .. })));
        assert!(!backend.is_connected());
    }

    #[test]
    fn test_next_delay_saturates() {
        let huge = Duration::from_secs(u64::MAX);
        assert_eq!(next_delay(huge, u64::MAX, 0.5), huge);
        assert!(next_delay(huge, u64::MAX, 0.999) >= huge);
    }

    #[tokio::test]
    async fn test_initial_delay_is_capped_by_max() {
        // Nothing listens on port 1, so both attempts fail immediately
        let mut reconnecting =
            ReconnectingWebSocket::with_settings("ws://127.0.0.1:1".to_string(), 2, 3600, 0);

        let result = tokio::time::timeout(Duration::from_secs(5), reconnecting.connect()).await;
        assert!(matches!(
            result,
            Ok(Err(RouterError::MaxReconnectAttemptsExceeded { attempts: 2, .. }))
        ));
    }

    #[tokio::test]
    async fn test_request_fails_fast_during_reconnect() {
        let backend = Arc::new(WebSocketBackend::new(ReconnectingWebSocket::with_settings(
            "ws://127.0.0.1:1".to_string(),
            3,
            2,
            2,
        )));
        let reconnecting = Arc::clone(&backend);
        let reconnect = tokio::spawn(async move { reconnecting.reconnect().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            backend.request("eth_sendTransaction", Value::Array(vec![])),
        )
        .await;

        reconnect.abort();
        assert!(matches!(result, Ok(Err(RouterError::TransportError { .. }))));
    }

    #[tokio::test]
    async fn test_rejected_head_subscription_is_reported() {
        // A plain HTTP transport has no pubsub, so eth_subscribe is refused
        // without any network traffic
        let Ok(provider) = WebSocketProvider::connect("http://127.0.0.1:1".to_string()).await else {
            unreachable!("building an HTTP transport does not connect");
        };
        let backend = WebSocketBackend::new(ReconnectingWebSocket::new(provider.url().to_string()));
        backend.publish(Some(provider));

        let result = backend.forward_new_heads().await;

        assert!(matches!(result, Err(RouterError::TransportError { .. })));
        assert!(backend
            .heads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none());
    }

    #[tokio::test]
    async fn test_close_emits_disconnect() {
        let backend =
            WebSocketBackend::new(ReconnectingWebSocket::new("wss://test.com".to_string()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        backend.on_event(
            "disconnect",
            crate::rpc::events::listener(move |payload| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(payload.clone());
                Ok(())
            }),
        );

        backend.close().await;

        let seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["code"], json!(DISCONNECTED_CODE));
    }

    #[tokio::test]
    async fn test_reconnection_logic_with_invalid_url() {
        let mut reconnecting = ReconnectingWebSocket::with_settings(
            "wss://invalid-url-that-will-fail-12345.com".to_string(),
            1,
            1,
            5,
        );

        let result = reconnecting.connect().await;
        assert!(matches!(
            result,
            Err(RouterError::MaxReconnectAttemptsExceeded { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    #[ignore = "Requires WRITE_RPC_URL environment variable"]
    async fn test_websocket_connection() {
        let Ok(ws_url) = std::env::var("WRITE_RPC_URL") else {
            return;
        };
        let backend = WebSocketBackend::connect(ws_url).await;
        assert!(backend.is_ok(), "WebSocket connection should succeed");
        if let Ok(backend) = backend {
            assert!(backend.chain_id().is_some());
        }
    }
}
