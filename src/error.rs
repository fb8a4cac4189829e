//! Error types for the hybrid provider router.
//!
//! This module provides a unified error type [`RouterError`] covering router
//! construction, backend transport failures, listener failures and the
//! connection lifecycle of the wallet backend.
//!
//! # Design
//!
//! The router never invents an error for a routed call: whatever a backend
//! returns as [`RouterError::TransportError`] is handed back to the caller
//! untouched. The remaining variants belong to the surrounding plumbing:
//! - [`RouterError::ConfigError`]: missing backends, bad tables, bad environment
//! - [`RouterError::ListenerError`]: a listener failed while an event was dispatched
//! - [`RouterError::NetworkMismatch`]: connected to a chain other than the expected one
//! - WebSocket variants: connection failures of the wallet backend
//!
//! # Example
//!
//! ```
//! use hybrid_provider::error::{RouterError, RouterResult};
//!
//! fn require_write_backend(present: bool) -> RouterResult<()> {
//!     if !present {
//!         return Err(RouterError::config("write backend is required", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`RouterError`].
pub type RouterResult<T> = Result<T, RouterError>;

/// Boxed error used as the `source` of a [`RouterError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the hybrid provider router.
#[derive(Debug)]
pub enum RouterError {
    /// Configuration errors.
    ///
    /// Variants include:
    /// - Missing read or write backend at construction
    /// - A method listed in more than one classification category
    /// - Missing or invalid environment variables
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// Error surfaced by a read or write backend.
    ///
    /// The router propagates these exactly as the backend produced them.
    TransportError {
        /// RPC method that failed
        method: String,
        /// JSON-RPC error code, when the node answered with an error object
        code: Option<i64>,
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// A registered event listener failed.
    ///
    /// Only ever logged; dispatch continues with the next listener.
    ListenerError {
        /// Event being dispatched
        event: String,
        /// Failure description
        message: String,
    },

    /// The connected chain is not the one the caller expected.
    NetworkMismatch {
        /// Chain id the caller asked for
        expected: u64,
        /// Chain id reported by the provider
        actual: u64,
    },

    /// WebSocket connection errors.
    ///
    /// Variants include:
    /// - Failed to establish WebSocket connection
    /// - Invalid WebSocket URL
    /// - Network connectivity issues
    WebSocketConnectionError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// The WebSocket is not connected.
    WebSocketDisconnected {
        /// Human-readable error message
        message: String,
    },

    /// Max reconnection attempts exceeded.
    MaxReconnectAttemptsExceeded {
        /// Number of attempts made
        attempts: u32,
        /// Last error encountered
        last_error: String,
    },
}

impl RouterError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use hybrid_provider::error::RouterError;
    ///
    /// let err = RouterError::config("READ_RPC_URL not set", None);
    /// assert!(matches!(err, RouterError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new transport error for `method`.
    ///
    /// # Example
    ///
    /// ```
    /// use hybrid_provider::error::RouterError;
    ///
    /// let err = RouterError::transport("eth_call", "execution reverted", None);
    /// assert_eq!(err.method(), Some("eth_call"));
    /// ```
    #[must_use]
    pub fn transport(
        method: impl Into<String>,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        Self::TransportError {
            method: method.into(),
            code: None,
            message: message.into(),
            source,
        }
    }

    /// Create a transport error carrying a JSON-RPC error code.
    #[must_use]
    pub fn rpc_response(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::TransportError {
            method: method.into(),
            code: Some(code),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new listener error.
    #[must_use]
    pub fn listener(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerError {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Create a network mismatch error.
    #[must_use]
    pub const fn network_mismatch(expected: u64, actual: u64) -> Self {
        Self::NetworkMismatch { expected, actual }
    }

    /// Create a new WebSocket connection error.
    ///
    /// # Example
    ///
    /// ```
    /// use hybrid_provider::error::RouterError;
    ///
    /// let err = RouterError::websocket_connection("Connection refused", None);
    /// assert!(matches!(err, RouterError::WebSocketConnectionError { .. }));
    /// ```
    #[must_use]
    pub fn websocket_connection(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::WebSocketConnectionError {
            message: message.into(),
            source,
        }
    }

    /// Create a new WebSocket disconnection error.
    #[must_use]
    pub fn websocket_disconnected(message: impl Into<String>) -> Self {
        Self::WebSocketDisconnected {
            message: message.into(),
        }
    }

    /// Create a max reconnect attempts exceeded error.
    #[must_use]
    pub fn max_reconnect_exceeded(attempts: u32, last_error: impl Into<String>) -> Self {
        Self::MaxReconnectAttemptsExceeded {
            attempts,
            last_error: last_error.into(),
        }
    }

    /// RPC method a transport error belongs to.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::TransportError { method, .. } => Some(method),
            _ => None,
        }
    }

    /// JSON-RPC error code of a transport error, if the node returned one.
    #[must_use]
    pub const fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::TransportError { code, .. } => *code,
            _ => None,
        }
    }
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::TransportError {
                method,
                code: Some(code),
                message,
                ..
            } => write!(f, "Transport error in {method} (code {code}): {message}"),
            Self::TransportError {
                method, message, ..
            } => write!(f, "Transport error in {method}: {message}"),
            Self::ListenerError { event, message } => {
                write!(f, "Listener error on '{event}': {message}")
            }
            Self::NetworkMismatch { expected, actual } => {
                write!(f, "Network mismatch: expected chain {expected}, connected to {actual}")
            }
            Self::WebSocketConnectionError { message, .. } => {
                write!(f, "WebSocket connection error: {message}")
            }
            Self::WebSocketDisconnected { message } => {
                write!(f, "WebSocket disconnected: {message}")
            }
            Self::MaxReconnectAttemptsExceeded {
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "Max reconnection attempts ({attempts}) exceeded. Last error: {last_error}"
                )
            }
        }
    }
}

impl std::error::Error for RouterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::TransportError { source, .. }
            | Self::WebSocketConnectionError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::ListenerError { .. }
            | Self::NetworkMismatch { .. }
            | Self::WebSocketDisconnected { .. }
            | Self::MaxReconnectAttemptsExceeded { .. } => None,
        }
    }
}

/// Convert from `eyre::Report` to `RouterError`.
///
/// Reports only come out of the WebSocket plumbing, so they are categorized
/// as connection errors.
impl From<eyre::Report> for RouterError {
    fn from(err: eyre::Report) -> Self {
        Self::WebSocketConnectionError {
            message: err.to_string(),
            source: None,
        }
    }
}
