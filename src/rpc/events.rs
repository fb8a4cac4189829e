//! Provider lifecycle events and the listener registry.
//!
//! A [`ListenerRegistry`] maps an event name to an ordered list of listeners.
//! Dispatch is synchronous and isolates listeners from each other: an error
//! or a panic in one listener is logged and the next listener still runs.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RouterError;

/// Callback invoked with the event payload.
pub type Listener = Arc<dyn Fn(&Value) -> eyre::Result<()> + Send + Sync>;

/// Wraps a closure into a [`Listener`].
///
/// Keep the returned `Arc` around to remove the listener later; removal
/// compares by reference.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Value) -> eyre::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Connection lifecycle events emitted by wallet providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEvent {
    /// Provider connected; payload `{ "chainId": "0x.." }`
    Connect,
    /// Provider lost its connection; payload is an RPC error object
    Disconnect,
    /// Exposed accounts changed; payload is an array of addresses
    AccountsChanged,
    /// Active chain changed; payload is the hex chain id
    ChainChanged,
    /// Provider message such as a subscription notification
    Message,
}

impl ProviderEvent {
    /// Every lifecycle event the router forwards.
    pub const ALL: [Self; 5] = [
        Self::Connect,
        Self::Disconnect,
        Self::AccountsChanged,
        Self::ChainChanged,
        Self::Message,
    ];

    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
            Self::Message => "message",
        }
    }
}

impl AsRef<str> for ProviderEvent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for ProviderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
struct Registration {
    listener: Listener,
    once: bool,
}

/// Event name → ordered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<String, Vec<Registration>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Registration>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `listener` to `event`. Registering the same listener twice
    /// makes it fire twice.
    pub fn on(&self, event: &str, listener: Listener) {
        self.push(event, listener, false);
    }

    /// Appends `listener` to `event`; it is removed before its first call.
    pub fn once(&self, event: &str, listener: Listener) {
        self.push(event, listener, true);
    }

    fn push(&self, event: &str, listener: Listener, once: bool) {
        self.lock()
            .entry(event.to_owned())
            .or_default()
            .push(Registration { listener, once });
    }

    /// Removes the first registration of `listener` on `event`.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, event: &str, listener: &Listener) -> bool {
        let mut listeners = self.lock();
        let Some(entries) = listeners.get_mut(event) else {
            return false;
        };
        let Some(index) = entries
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.listener, listener))
        else {
            return false;
        };
        entries.remove(index);
        if entries.is_empty() {
            listeners.remove(event);
        }
        true
    }

    /// Clears `event`, or every event when `None`.
    pub fn clear(&self, event: Option<&str>) {
        let mut listeners = self.lock();
        match event {
            Some(event) => {
                listeners.remove(event);
            }
            None => listeners.clear(),
        }
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Names of events with at least one listener, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Delivers `payload` to every listener of `event` in registration order.
    ///
    /// The list is snapshotted before delivery, so listeners may register or
    /// remove listeners without affecting the current dispatch. Returns the
    /// number of listeners invoked.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let snapshot = {
            let mut listeners = self.lock();
            let Some(entries) = listeners.get_mut(event) else {
                return 0;
            };
            let snapshot = entries.clone();
            entries.retain(|entry| !entry.once);
            if entries.is_empty() {
                listeners.remove(event);
            }
            snapshot
        };

        debug!(event, listeners = snapshot.len(), "Dispatching event");

        for entry in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.listener)(payload)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => RouterError::listener(event, format!("{e:#}")),
                Err(panic) => RouterError::listener(event, panic_message(panic.as_ref())),
            };
            warn!(event, error = %failure, "Event listener failed");
        }

        snapshot.len()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<String, usize> = self
            .lock()
            .iter()
            .map(|(event, entries)| (event.clone(), entries.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("listener panicked: {message}")
    } else {
        "listener panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Listener {
        let log = Arc::clone(log);
        listener(move |_| {
            log.lock().unwrap_or_else(PoisonError::into_inner).push(tag);
            Ok(())
        })
    }

    #[test]
    fn test_emit_in_registration_order() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.on("connect", recorder(&log, "first"));
        registry.on("connect", recorder(&log, "second"));

        assert_eq!(registry.emit("connect", &Value::Null), 2);
        assert_eq!(*log.lock().unwrap_or_else(PoisonError::into_inner), vec!["first", "second"]);
    }

    #[test]
    fn test_emit_without_listeners() {
        let registry = ListenerRegistry::new();
        assert_eq!(registry.emit("message", &Value::Null), 0);
    }

    #[test]
    #[allow(clippy::panic)]
    fn test_failing_listeners_do_not_stop_dispatch() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.on("chainChanged", listener(|_| Err(eyre::eyre!("boom"))));
        registry.on("chainChanged", listener(|_| panic!("listener exploded")));
        registry.on("chainChanged", recorder(&log, "survivor"));

        assert_eq!(registry.emit("chainChanged", &Value::from("0x1")), 3);
        assert_eq!(*log.lock().unwrap_or_else(PoisonError::into_inner), vec!["survivor"]);
    }

    #[test]
    fn test_duplicate_registration_fires_twice() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let l = listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        registry.on("connect", Arc::clone(&l));
        registry.on("connect", Arc::clone(&l));
        registry.emit("connect", &Value::Null);

        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Removal takes out one registration at a time
        assert!(registry.remove("connect", &l));
        assert_eq!(registry.count("connect"), 1);
    }

    #[test]
    fn test_once_fires_once() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.once(
            "accountsChanged",
            listener(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        registry.emit("accountsChanged", &Value::Null);
        registry.emit("accountsChanged", &Value::Null);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count("accountsChanged"), 0);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let registry = ListenerRegistry::new();
        let l = listener(|_| Ok(()));
        assert!(!registry.remove("connect", &l));

        registry.on("connect", listener(|_| Ok(())));
        assert!(!registry.remove("connect", &l));
        assert_eq!(registry.count("connect"), 1);
    }

    #[test]
    fn test_listener_can_register_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let inner = Arc::clone(&registry);
        registry.on(
            "connect",
            listener(move |_| {
                inner.on("connect", listener(|_| Ok(())));
                Ok(())
            }),
        );

        assert_eq!(registry.emit("connect", &Value::Null), 1);
        assert_eq!(registry.count("connect"), 2);
    }

    #[test]
    fn test_clear() {
        let registry = ListenerRegistry::new();
        registry.on("connect", listener(|_| Ok(())));
        registry.on("chainChanged", listener(|_| Ok(())));

        registry.clear(Some("chainChanged"));
        assert_eq!(registry.event_names(), vec!["connect".to_string()]);

        registry.clear(None);
        assert!(registry.event_names().is_empty());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ProviderEvent::AccountsChanged.as_str(), "accountsChanged");
        assert_eq!(ProviderEvent::ChainChanged.to_string(), "chainChanged");
        assert_eq!(ProviderEvent::ALL.len(), 5);
    }
}
