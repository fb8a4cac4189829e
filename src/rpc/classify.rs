//! Method classification tables.
//!
//! Routing is driven by data: each RPC method name belongs to at most one
//! [`MethodClass`], and anything the table does not know is routed to the
//! write backend.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{RouterError, RouterResult};

/// Methods that can be served by a plain public RPC endpoint.
pub const DEFAULT_PURE_READ_METHODS: &[&str] = &[
    "eth_chainId",
    "eth_accounts",
    "net_version",
    "eth_blockNumber",
    "eth_getBalance",
    "eth_getCode",
    "eth_getStorageAt",
    "eth_call",
    "eth_estimateGas",
    "eth_gasPrice",
    "eth_maxPriorityFeePerGas",
    "eth_feeHistory",
    "eth_getBlockByNumber",
    "eth_getBlockByHash",
    "eth_getBlockTransactionCountByNumber",
    "eth_getBlockTransactionCountByHash",
    "eth_getLogs",
    "eth_getTransactionCount",
    "eth_syncing",
    "web3_clientVersion",
];

/// Methods that follow the lifecycle of a transaction the wallet submitted.
pub const DEFAULT_TRANSACTION_METHODS: &[&str] = &[
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
    "eth_getTransactionByBlockHashAndIndex",
    "eth_getTransactionByBlockNumberAndIndex",
    "eth_sendRawTransaction",
];

/// Methods that need the wallet: signing, submission, permissions.
pub const DEFAULT_WRITE_METHODS: &[&str] = &[
    "eth_sendTransaction",
    "eth_signTransaction",
    "eth_sign",
    "personal_sign",
    "eth_signTypedData",
    "eth_signTypedData_v3",
    "eth_signTypedData_v4",
    "eth_requestAccounts",
    "wallet_switchEthereumChain",
    "wallet_addEthereumChain",
    "wallet_watchAsset",
    "wallet_requestPermissions",
    "wallet_getPermissions",
];

/// Read methods the wallet answers reliably when the read endpoint fails.
pub const DEFAULT_FALLBACK_METHODS: &[&str] = &["eth_chainId", "eth_accounts", "net_version"];

/// Category a method belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodClass {
    /// Served by the read backend
    PureRead,
    /// Transaction lookups and submission, served by the wallet
    Transaction,
    /// Signing and wallet management, served by the wallet
    Write,
}

impl MethodClass {
    /// Backend a method of this class is sent to.
    #[must_use]
    pub const fn route(self) -> Route {
        match self {
            Self::PureRead => Route::Read,
            Self::Transaction | Self::Write => Route::Write,
        }
    }

    /// Short label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PureRead => "pure-read",
            Self::Transaction => "transaction",
            Self::Write => "write",
        }
    }
}

/// Backend selected for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Public RPC endpoint
    Read,
    /// Wallet provider
    Write,
}

impl Route {
    /// Short label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Mapping from method name to [`MethodClass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTable {
    classes: HashMap<String, MethodClass>,
}

impl MethodTable {
    /// Builds a table from one list per category.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a method appears in more than one
    /// category. Repeating a method inside the same category is accepted.
    pub fn new<S: AsRef<str>>(
        pure_read: &[S],
        transaction: &[S],
        write: &[S],
    ) -> RouterResult<Self> {
        let mut classes = HashMap::new();
        let groups = [
            (MethodClass::PureRead, pure_read),
            (MethodClass::Transaction, transaction),
            (MethodClass::Write, write),
        ];

        for (class, methods) in groups {
            for method in methods {
                let method = method.as_ref();
                match classes.insert(method.to_owned(), class) {
                    Some(previous) if previous != class => {
                        return Err(RouterError::config(
                            format!(
                                "method {method} is classified as both {} and {}",
                                previous.as_str(),
                                class.as_str()
                            ),
                            None,
                        ));
                    }
                    _ => {}
                }
            }
        }

        Ok(Self { classes })
    }

    /// Returns an empty table; every method routes to the write backend.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    /// Category of `method`, or `None` when the table does not list it.
    #[must_use]
    pub fn classify(&self, method: &str) -> Option<MethodClass> {
        self.classes.get(method).copied()
    }

    /// Backend for `method`. Unlisted methods go to the write backend.
    #[must_use]
    pub fn route(&self, method: &str) -> Route {
        self.classify(method).map_or(Route::Write, MethodClass::route)
    }

    /// Moves `method` into `class`, replacing any previous category.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>, class: MethodClass) -> Self {
        self.classes.insert(method.into(), class);
        self
    }

    /// Number of classified methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the table classifies nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        let mut classes = HashMap::new();
        for (class, methods) in [
            (MethodClass::PureRead, DEFAULT_PURE_READ_METHODS),
            (MethodClass::Transaction, DEFAULT_TRANSACTION_METHODS),
            (MethodClass::Write, DEFAULT_WRITE_METHODS),
        ] {
            for method in methods {
                classes.insert((*method).to_owned(), class);
            }
        }
        Self { classes }
    }
}

/// Read methods allowed to retry once on the write backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackList {
    methods: HashSet<String>,
}

impl FallbackList {
    /// Builds an allow-list from method names.
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// An allow-list that never falls back.
    #[must_use]
    pub fn none() -> Self {
        Self {
            methods: HashSet::new(),
        }
    }

    /// Whether `method` may be retried on the write backend.
    #[must_use]
    pub fn allows(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Allowed methods, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

impl Default for FallbackList {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_METHODS.iter().copied())
    }
}
