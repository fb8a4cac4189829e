//! Provider handle traits shared by every backend.
//!
//! Both sides of the router are reached through [`RequestProvider`]; the
//! write side additionally implements [`WalletProvider`] so the router can
//! follow its connection lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::events::Listener;
use crate::error::RouterResult;

/// A provider that answers JSON-RPC style requests.
#[async_trait]
pub trait RequestProvider: Send + Sync {
    /// Sends `method` with `params` (an array or an object) and returns the
    /// raw result.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::TransportError`](crate::error::RouterError::TransportError)
    /// when the call fails.
    async fn request(&self, method: &str, params: Value) -> RouterResult<Value>;
}

/// A wallet-backed provider: requests plus lifecycle events.
pub trait WalletProvider: RequestProvider {
    /// Registers `listener` for `event`.
    fn on_event(&self, event: &str, listener: Listener);

    /// Removes the first registration of `listener` for `event`.
    fn remove_event_listener(&self, event: &str, listener: &Listener);
}

#[async_trait]
impl<T: RequestProvider + ?Sized> RequestProvider for Arc<T> {
    async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        (**self).request(method, params).await
    }
}

impl<T: WalletProvider + ?Sized> WalletProvider for Arc<T> {
    fn on_event(&self, event: &str, listener: Listener) {
        (**self).on_event(event, listener);
    }

    fn remove_event_listener(&self, event: &str, listener: &Listener) {
        (**self).remove_event_listener(event, listener);
    }
}
