//! In-memory backends that record every call.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use hybrid_provider::error::{RouterError, RouterResult};
use hybrid_provider::rpc::{Listener, ListenerRegistry, RequestProvider, WalletProvider};
use serde_json::Value;

/// Scripted answer for a method.
#[derive(Clone)]
pub enum Reply {
    Ok(Value),
    /// JSON-RPC error object with code and message
    Err(i64, &'static str),
}

/// Backend answering from a script; unknown methods fail with -32601.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, method: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_string(), reply);
        self
    }

    /// Methods received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Params received with the last call.
    pub fn last_params(&self) -> Option<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(_, params)| params.clone())
    }
}

#[async_trait]
impl RequestProvider for MockBackend {
    async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((method.to_string(), params));

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned();

        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Err(code, message)) => {
                Err(RouterError::rpc_response(method, code, message))
            }
            None => Err(RouterError::rpc_response(method, -32601, "method not found")),
        }
    }
}

/// Wallet built on [`MockBackend`] that can emit lifecycle events.
#[derive(Default)]
pub struct MockWallet {
    pub backend: MockBackend,
    pub events: ListenerRegistry,
}

impl MockWallet {
    pub fn new(backend: MockBackend) -> Self {
        Self {
            backend,
            events: ListenerRegistry::new(),
        }
    }

    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        self.events.emit(event, payload)
    }

    pub fn calls(&self) -> Vec<String> {
        self.backend.calls()
    }
}

#[async_trait]
impl RequestProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> RouterResult<Value> {
        self.backend.request(method, params).await
    }
}

impl WalletProvider for MockWallet {
    fn on_event(&self, event: &str, listener: Listener) {
        self.events.on(event, listener);
    }

    fn remove_event_listener(&self, event: &str, listener: &Listener) {
        self.events.remove(event, listener);
    }
}
