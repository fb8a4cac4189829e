//! Integration tests for wallet event re-emission.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use common::{MockBackend, MockWallet};
use hybrid_provider::rpc::{listener, HybridProvider, Listener, ProviderEvent};
use serde_json::{json, Value};

type Log = Arc<Mutex<Vec<String>>>;

fn router(wallet: &Arc<MockWallet>) -> HybridProvider {
    let built = HybridProvider::builder()
        .read(MockBackend::new())
        .write(Arc::clone(wallet))
        .build();
    match built {
        Ok(router) => router,
        Err(e) => unreachable!("both backends supplied: {e}"),
    }
}

fn recorder(log: &Log, tag: &'static str) -> Listener {
    let log = Arc::clone(log);
    listener(move |payload| {
        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{tag}:{payload}"));
        Ok(())
    })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

#[test]
fn test_wallet_events_reach_router_listeners_in_order() {
    let wallet = Arc::new(MockWallet::default());
    let provider = router(&wallet);
    let log: Log = Arc::default();

    provider
        .on(ProviderEvent::ChainChanged, recorder(&log, "first"))
        .on(ProviderEvent::ChainChanged, recorder(&log, "second"));

    wallet.emit("chainChanged", &json!("0x2105"));

    assert_eq!(
        entries(&log),
        vec![r#"first:"0x2105""#, r#"second:"0x2105""#]
    );
}

#[test]
fn test_every_lifecycle_event_is_forwarded() {
    let wallet = Arc::new(MockWallet::default());
    let provider = router(&wallet);
    let log: Log = Arc::default();

    for event in ProviderEvent::ALL {
        provider.on(event, recorder(&log, event.as_str()));
    }

    wallet.emit("connect", &json!({ "chainId": "0x1" }));
    wallet.emit("accountsChanged", &json!(["0x01"]));
    wallet.emit("message", &json!({ "type": "eth_subscription" }));
    wallet.emit("disconnect", &json!({ "code": 4900, "message": "gone" }));

    let log = entries(&log);
    assert_eq!(log.len(), 4);
    assert!(log[0].starts_with("connect:"));
    assert!(log[1].starts_with("accountsChanged:"));
    assert!(log[2].starts_with("message:"));
    assert!(log[3].starts_with("disconnect:"));
}

#[test]
fn test_failing_listener_does_not_block_the_next() {
    let wallet = Arc::new(MockWallet::default());
    let provider = router(&wallet);
    let log: Log = Arc::default();

    provider
        .on("accountsChanged", listener(|_| Err(eyre::eyre!("listener failed"))))
        .on("accountsChanged", recorder(&log, "after"));

    wallet.emit("accountsChanged", &json!([]));

    assert_eq!(entries(&log), vec!["after:[]"]);
}

#[test]
fn test_once_listener_fires_a_single_time() {
    let wallet = Arc::new(MockWallet::default());
    let provider = router(&wallet);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    provider.once(
        ProviderEvent::Connect,
        listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    wallet.emit("connect", &json!({ "chainId": "0x1" }));
    wallet.emit("connect", &json!({ "chainId": "0x1" }));

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(provider.listener_count(ProviderEvent::Connect), 0);
}

#[test]
fn test_remove_listener_removes_first_registration() {
    let wallet = Arc::new(MockWallet::default());
    let provider = router(&wallet);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let counting = listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    provider
        .on("message", Arc::clone(&counting))
        .on("message", Arc::clone(&counting))
        .remove_listener("message", &counting);

    wallet.emit("message", &Value::Null);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Removing something never registered is a no-op
    provider.remove_listener("message", &listener(|_| Ok(())));
    assert_eq!(provider.listener_count("message"), 1);
}

#[test]
fn test_remove_all_listeners() {
    let wallet = Arc::new(MockWallet::default());
    let provider = router(&wallet);
    let log: Log = Arc::default();

    provider
        .on("connect", recorder(&log, "connect"))
        .on("chainChanged", recorder(&log, "chain"));

    provider.remove_all_listeners(Some("chainChanged"));
    wallet.emit("chainChanged", &json!("0x1"));
    wallet.emit("connect", &json!({}));
    assert_eq!(entries(&log), vec!["connect:{}"]);

    provider.remove_all_listeners(None);
    wallet.emit("connect", &json!({}));
    assert_eq!(entries(&log).len(), 1);

    // The router stays subscribed to the wallet
    assert_eq!(wallet.events.count("connect"), 1);
}

#[test]
fn test_listeners_are_per_router() {
    let wallet = Arc::new(MockWallet::default());
    let first = router(&wallet);
    let second = router(&wallet);
    let log: Log = Arc::default();

    first.on("chainChanged", recorder(&log, "first"));
    second.on("chainChanged", recorder(&log, "second"));

    first.remove_all_listeners(None);
    wallet.emit("chainChanged", &json!("0xa"));

    assert_eq!(entries(&log), vec![r#"second:"0xa""#]);
}

#[test]
fn test_dropping_router_detaches_from_wallet() {
    let wallet = Arc::new(MockWallet::default());
    let log: Log = Arc::default();

    let provider = router(&wallet);
    provider.on("connect", recorder(&log, "connect"));
    for event in ProviderEvent::ALL {
        assert_eq!(wallet.events.count(event.as_str()), 1);
    }

    drop(provider);

    for event in ProviderEvent::ALL {
        assert_eq!(wallet.events.count(event.as_str()), 0);
    }
    assert_eq!(wallet.emit("connect", &json!({})), 0);
    assert!(entries(&log).is_empty());
}
