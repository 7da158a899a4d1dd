// src/error.rs

use thiserror::Error;

/// Errors produced by the bus layer.
///
/// Variants fall into four groups:
/// - construction-time configuration errors (the bus never becomes ready)
/// - per-call routing errors
/// - per-call transport, timeout and cancellation errors
/// - shutdown errors, which are collected and logged but never raised
#[derive(Error, Debug)]
pub enum BusError {
    /// Invalid or conflicting configuration detected while building a bus.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No transport could be resolved for a message.
    #[error("could not find route for message type: {message_type} and name: {}", name.as_deref().unwrap_or("<none>"))]
    Routing {
        /// Runtime message type that was being routed.
        message_type: String,
        /// Explicit bus or path name requested by the caller, if any.
        name: Option<String>,
    },

    /// An explicitly named bus does not exist.
    #[error("unknown bus: {0}")]
    UnknownBus(String),

    /// Failure reported by the underlying transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// A resource failed to close during shutdown.
    #[error("failed to close {resource}: {reason}")]
    Shutdown {
        /// Human readable name of the resource (e.g. `queue client orders`).
        resource: String,
        /// Close failure reported by the transport.
        reason: String,
    },

    /// No response arrived within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the request before a response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The remote request handler reported a failure.
    #[error("request handler failed: {0}")]
    Handler(String),

    /// The bus has started shutting down and accepts no new work.
    #[error("bus {0} is shutting down")]
    ShuttingDown(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BusError {
    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        BusError::Configuration(msg.into())
    }

    /// Shorthand for a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        BusError::Transport(msg.into())
    }

    /// True if no transport or path could be resolved for a message.
    pub fn is_routing(&self) -> bool {
        matches!(self, BusError::Routing { .. } | BusError::UnknownBus(_))
    }
}

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;
