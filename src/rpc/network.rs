//! Network detection and validation.
//!
//! [`NetworkCache`] asks a provider for its chain id once and keeps the
//! answer until [`NetworkCache::clear`] is called. Hand the same cache to
//! every component that needs the network so they share one lookup.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::backend::RequestProvider;
use crate::error::{RouterError, RouterResult};

/// Chains with a known display name.
const KNOWN_CHAINS: &[(u64, &str)] = &[
    (1, "mainnet"),
    (10, "optimism"),
    (100, "gnosis"),
    (137, "polygon"),
    (8453, "base"),
    (42161, "arbitrum"),
    (84532, "base-sepolia"),
    (11_155_111, "sepolia"),
];

/// Chain a provider is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    /// Numeric chain id
    pub chain_id: u64,
    /// Display name, when the chain is well known
    pub name: Option<&'static str>,
}

impl NetworkInfo {
    /// Builds the info for `chain_id`, resolving its name.
    #[must_use]
    pub fn from_chain_id(chain_id: u64) -> Self {
        let name = KNOWN_CHAINS
            .iter()
            .find(|(id, _)| *id == chain_id)
            .map(|(_, name)| *name);
        Self { chain_id, name }
    }

    /// Chain id as a `0x`-prefixed hex quantity.
    #[must_use]
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// Checks that this is the `expected` chain.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NetworkMismatch`] when the chain ids differ.
    pub fn validate(&self, expected: u64) -> RouterResult<()> {
        if self.chain_id == expected {
            Ok(())
        } else {
            Err(RouterError::network_mismatch(expected, self.chain_id))
        }
    }
}

impl std::fmt::Display for NetworkInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            Some(name) => write!(f, "{name} ({})", self.chain_id),
            None => write!(f, "chain {}", self.chain_id),
        }
    }
}

/// Parses a hex quantity such as `0x2105`. Decimal strings are accepted too,
/// as some wallets answer `net_version`-style.
///
/// # Errors
///
/// Returns a transport error for anything that is not a chain id.
pub fn parse_chain_id(raw: &str) -> RouterResult<u64> {
    let parsed = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).map_or_else(
        || raw.parse::<u64>(),
        |hex| u64::from_str_radix(hex, 16),
    );
    parsed.map_err(|e| {
        RouterError::transport(
            "eth_chainId",
            format!("invalid chain id '{raw}'"),
            Some(Box::new(e)),
        )
    })
}

/// Decodes an `eth_chainId` answer: a hex or decimal string, or a bare number.
///
/// # Errors
///
/// Returns a transport error for anything that is not a chain id.
pub fn decode_chain_id(raw: &Value) -> RouterResult<u64> {
    match raw {
        Value::String(s) => parse_chain_id(s),
        Value::Number(n) => n.as_u64().ok_or_else(|| {
            RouterError::transport("eth_chainId", format!("invalid chain id {n}"), None)
        }),
        other => Err(RouterError::transport(
            "eth_chainId",
            format!("unexpected chain id response {other}"),
            None,
        )),
    }
}

/// Init-once cache of the detected network.
#[derive(Debug, Default)]
pub struct NetworkCache {
    detected: Mutex<Option<NetworkInfo>>,
}

impl NetworkCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached network, querying `provider` with `eth_chainId`
    /// on first use.
    ///
    /// Concurrent callers wait for the first lookup instead of issuing their
    /// own. A failed lookup is not cached.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or a transport error if the answer is
    /// not a chain id.
    pub async fn detect<P>(&self, provider: &P) -> RouterResult<NetworkInfo>
    where
        P: RequestProvider + ?Sized,
    {
        let mut detected = self.detected.lock().await;
        if let Some(info) = *detected {
            debug!(chain_id = info.chain_id, "Using cached network");
            return Ok(info);
        }

        let raw = provider
            .request("eth_chainId", Value::Array(Vec::new()))
            .await?;
        let chain_id = decode_chain_id(&raw)?;

        let info = NetworkInfo::from_chain_id(chain_id);
        info!(network = %info, "Detected network");
        *detected = Some(info);
        Ok(info)
    }

    /// Detects the network and checks it is `expected`.
    ///
    /// # Errors
    ///
    /// Returns the detection error or [`RouterError::NetworkMismatch`].
    pub async fn validate<P>(&self, provider: &P, expected: u64) -> RouterResult<NetworkInfo>
    where
        P: RequestProvider + ?Sized,
    {
        let info = self.detect(provider).await?;
        info.validate(expected)?;
        Ok(info)
    }

    /// Cached network, without querying.
    pub async fn cached(&self) -> Option<NetworkInfo> {
        *self.detected.lock().await
    }

    /// Forgets the cached network; the next [`detect`](Self::detect) queries again.
    pub async fn clear(&self) {
        self.detected.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ChainIdProvider {
        answer: Value,
        calls: AtomicUsize,
    }

    impl ChainIdProvider {
        fn new(answer: Value) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RequestProvider for ChainIdProvider {
        async fn request(&self, _method: &str, _params: Value) -> RouterResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x1").ok(), Some(1));
        assert_eq!(parse_chain_id("0x2105").ok(), Some(8453));
        assert_eq!(parse_chain_id("0XAA36A7").ok(), Some(11_155_111));
        assert_eq!(parse_chain_id("137").ok(), Some(137));
        assert!(parse_chain_id("0xzz").is_err());
        assert!(parse_chain_id("").is_err());
    }

    #[test]
    fn test_network_info() {
        let base = NetworkInfo::from_chain_id(8453);
        assert_eq!(base.name, Some("base"));
        assert_eq!(base.chain_id_hex(), "0x2105");
        assert_eq!(base.to_string(), "base (8453)");
        assert_eq!(NetworkInfo::from_chain_id(31337).to_string(), "chain 31337");
    }

    #[test]
    fn test_validate() {
        let info = NetworkInfo::from_chain_id(1);
        assert!(info.validate(1).is_ok());
        assert!(matches!(
            info.validate(10),
            Err(RouterError::NetworkMismatch {
                expected: 10,
                actual: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_detect_is_cached_until_cleared() {
        let provider = ChainIdProvider::new(Value::from("0xa"));
        let cache = NetworkCache::new();
        assert!(cache.cached().await.is_none());

        let first = cache.detect(&provider).await;
        let second = cache.detect(&provider).await;
        assert_eq!(first.ok().map(|i| i.chain_id), Some(10));
        assert_eq!(second.ok().and_then(|i| i.name), Some("optimism"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        cache.clear().await;
        assert!(cache.cached().await.is_none());
        let _ = cache.detect(&provider).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_detect_rejects_garbage() {
        let provider = ChainIdProvider::new(serde_json::json!({"chain": 1}));
        let cache = NetworkCache::new();
        assert!(cache.detect(&provider).await.is_err());
        assert!(cache.cached().await.is_none());
    }

    #[tokio::test]
    async fn test_validate_mismatch() {
        let provider = ChainIdProvider::new(Value::from("0x1"));
        let cache = NetworkCache::new();
        let result = cache.validate(&provider, 8453).await;
        assert!(matches!(result, Err(RouterError::NetworkMismatch { .. })));
        // Detection itself is still cached
        assert_eq!(cache.cached().await.map(|i| i.chain_id), Some(1));
    }

    #[test]
    fn test_network_info_serializes_name() {
        let value = serde_json::to_value(NetworkInfo::from_chain_id(8453)).ok();
        assert_eq!(
            value,
            Some(serde_json::json!({ "chain_id": 8453, "name": "base" }))
        );
    }

    #[test]
    fn test_decode_chain_id_shapes() {
        assert_eq!(decode_chain_id(&Value::from("0x2105")).ok(), Some(8453));
        assert_eq!(decode_chain_id(&Value::from("8453")).ok(), Some(8453));
        assert_eq!(decode_chain_id(&Value::from(8453_u64)).ok(), Some(8453));
        assert!(decode_chain_id(&Value::from(-1)).is_err());
        assert!(decode_chain_id(&Value::Null).is_err());
    }
}
