//! HTTP read backend.
//!
//! Forwards requests to a public JSON-RPC endpoint through Alloy's HTTP
//! provider. This is the "read" side of the [`HybridProvider`](super::HybridProvider).
//!
//! ## Example
//!
//! ```no_run
//! use hybrid_provider::rpc::{HttpBackend, RequestProvider};
//! use hybrid_provider::error::RouterResult;
//! use serde_json::json;
//!
//! # async fn example() -> RouterResult<()> {
//! let backend = HttpBackend::connect("https://mainnet.base.org").await?;
//! let chain_id = backend.request("eth_chainId", json!([])).await?;
//! println!("Chain: {chain_id}");
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;

use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::backend::RequestProvider;
use crate::error::{RouterError, RouterResult};

/// Type alias for the HTTP provider.
pub type Provider = RootProvider<Http<Client>>;

/// Read backend over a plain HTTP JSON-RPC endpoint.
#[derive(Clone)]
pub struct HttpBackend {
    provider: Provider,
    host: String,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Creates a backend for `rpc_url`.
    ///
    /// No request is made; the first call will reveal whether the endpoint
    /// is reachable.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL cannot be parsed.
    #[allow(clippy::unused_async)]
    #[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
    pub async fn connect(rpc_url: &str) -> RouterResult<Self> {
        info!("Initializing HTTP read backend");

        // Host only: path segments often carry API keys
        let host = redact_url(rpc_url);
        tracing::Span::current().record("rpc_host", host.as_str());

        let url = rpc_url.parse().map_err(|e| {
            RouterError::config(
                format!("Invalid read RPC URL: '{host}'. Expected an http(s) endpoint"),
                Some(Box::new(e)),
            )
        })?;

        let provider = ProviderBuilder::new().on_http(url);

        info!(rpc_host = %host, "HTTP read backend initialized");

        Ok(Self { provider, host })
    }

    /// Returns the underlying Alloy provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Host of the endpoint, without path or query.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl RequestProvider for HttpBackend {
    #[instrument(skip(self, params), fields(rpc_host = %self.host))]
    async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        let start = std::time::Instant::now();

        let result = self
            .provider
            .raw_request::<_, Value>(Cow::Owned(method.to_owned()), normalize_params(params))
            .await
            .map_err(|e| transport_error(method, e));

        let duration_ms = start.elapsed().as_millis();
        match &result {
            Ok(_) => debug!(method, duration_ms, "Read request completed"),
            Err(e) => warn!(method, duration_ms, error = %e, "Read request failed"),
        }

        result
    }
}

/// Missing params are sent as an empty positional list.
pub(crate) fn normalize_params(params: Value) -> Value {
    if params.is_null() {
        Value::Array(Vec::new())
    } else {
        params
    }
}

/// Maps an Alloy transport error, keeping the node's error code when present.
pub(crate) fn transport_error(method: &str, err: TransportError) -> RouterError {
    match err {
        RpcError::ErrorResp(payload) => {
            RouterError::rpc_response(method, payload.code, payload.message.to_string())
        }
        other => RouterError::transport(method, other.to_string(), Some(Box::new(other))),
    }
}

/// Strips everything after the host from a URL for logging.
pub(crate) fn redact_url(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("", url));
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if scheme.is_empty() {
        host.to_string()
    } else {
        format!("{scheme}://{host}")
    }
}
