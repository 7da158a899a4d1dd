// src/domain/transport.rs

//! Transport collaborator abstractions.
//!
//! This module defines the narrow interface through which the bus talks to a
//! concrete broker SDK. The bus never sees connection details, wire formats or
//! retry policies; it only asks a [`TransportFactory`] for a producer bound to
//! one path, or a receiver bound to one path (and subscription), and hands
//! opaque [`Envelope`]s across.
//!
//! Concrete implementations live under `src/transport/`.

use crate::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Whether a path is point-to-point or fan-out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathKind {
    /// Point-to-point: each message is handled by exactly one receiver.
    Queue,
    /// Fan-out: each subscription receives every message.
    Topic,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Queue => f.write_str("queue"),
            PathKind::Topic => f.write_str("topic"),
        }
    }
}

/// A logical path (queue or topic name) within one transport.
///
/// Paths are immutable, cheap to clone, and safe to share across threads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Address(pub Arc<str>);

impl Address {
    /// Borrow the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Address(value.into())
    }
}

impl Borrow<str> for Address {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A path together with its kind.
///
/// Used for reply-to addressing, where the responder cannot classify the
/// requester's path on its own.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    // ---
    pub path: Address,
    pub kind: PathKind,
}

impl Endpoint {
    pub fn new(path: impl Into<Address>, kind: PathKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Where a receiver pulls messages from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReceiverSource {
    /// Compete for messages on a queue.
    Queue { path: Address },
    /// Receive every message on a topic through a named subscription.
    Subscription { topic: Address, subscription: Arc<str> },
}

impl ReceiverSource {
    /// The path the receiver is bound to.
    pub fn path(&self) -> &Address {
        match self {
            ReceiverSource::Queue { path } => path,
            ReceiverSource::Subscription { topic, .. } => topic,
        }
    }

    /// The kind of path the receiver is bound to.
    pub fn kind(&self) -> PathKind {
        match self {
            ReceiverSource::Queue { .. } => PathKind::Queue,
            ReceiverSource::Subscription { .. } => PathKind::Topic,
        }
    }
}

impl fmt::Display for ReceiverSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverSource::Queue { path } => write!(f, "queue {path}"),
            ReceiverSource::Subscription {
                topic,
                subscription,
            } => write!(f, "topic {topic} subscription {subscription}"),
        }
    }
}

/// An opaque message envelope.
///
/// The unit handed to producers and yielded by receivers. The transport does
/// not interpret the payload or the metadata; it is responsible only for
/// delivery to `path`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    // ---
    /// Delivery path.
    pub path: Address,

    /// Name of the message type carried in the payload.
    pub message_type: Option<Arc<str>>,

    /// Opaque payload bytes produced by the serializer.
    pub payload: Bytes,

    /// Correlation identifier linking a request to its response.
    pub correlation_id: Option<Arc<str>>,

    /// Where the response to a request must be sent.
    pub reply_to: Option<Endpoint>,

    /// Set on a response when the request handler failed.
    pub error: Option<Arc<str>>,
}

impl Envelope {
    // ---
    /// Create a one-way message envelope.
    pub fn message(path: Address, message_type: Arc<str>, payload: Bytes) -> Self {
        Self {
            path,
            message_type: Some(message_type),
            payload,
            correlation_id: None,
            reply_to: None,
            error: None,
        }
    }

    /// Create a request envelope expecting a response on `reply_to`.
    pub fn request(
        path: Address,
        message_type: Arc<str>,
        payload: Bytes,
        correlation_id: Arc<str>,
        reply_to: Endpoint,
    ) -> Self {
        Self {
            path,
            message_type: Some(message_type),
            payload,
            correlation_id: Some(correlation_id),
            reply_to: Some(reply_to),
            error: None,
        }
    }

    /// Create a successful response envelope.
    pub fn response(path: Address, payload: Bytes, correlation_id: Arc<str>) -> Self {
        Self {
            path,
            message_type: None,
            payload,
            correlation_id: Some(correlation_id),
            reply_to: None,
            error: None,
        }
    }

    /// Create a response envelope reporting a handler failure.
    pub fn failure(path: Address, correlation_id: Arc<str>, error: impl Into<Arc<str>>) -> Self {
        Self {
            path,
            message_type: None,
            payload: Bytes::new(),
            correlation_id: Some(correlation_id),
            reply_to: None,
            error: Some(error.into()),
        }
    }

    /// True if this envelope expects a response.
    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some() && self.correlation_id.is_some()
    }
}

/// Send-capable client bound to one path.
///
/// Expensive to create, cheap to reuse; the bus caches one per path.
#[async_trait::async_trait]
pub trait Producer: Send + Sync {
    /// The path this client sends to.
    fn path(&self) -> &str;

    /// Send an envelope. No retry is expected from the caller.
    async fn send(&self, env: Envelope) -> Result<()>;

    /// Release the client.
    async fn close(&self) -> Result<()>;
}

/// Receive-capable client bound to one queue or subscription.
///
/// `receive` may be awaited concurrently from several tasks; each envelope is
/// yielded to exactly one of them.
#[async_trait::async_trait]
pub trait Receiver: Send + Sync {
    /// The source this receiver pulls from.
    fn source(&self) -> &ReceiverSource;

    /// Wait for the next envelope. `None` once the receiver is closed.
    async fn receive(&self) -> Option<Envelope>;

    /// Release the receiver.
    async fn close(&self) -> Result<()>;
}

/// Shared producer pointer.
pub type ProducerPtr = Arc<dyn Producer>;

/// Shared receiver pointer.
pub type ReceiverPtr = Arc<dyn Receiver>;

/// Factory for transport clients.
///
/// This is the only piece of a concrete broker integration the bus depends on.
#[async_trait::async_trait]
pub trait TransportFactory: Send + Sync {
    /// Create a producer for `path` of the given kind.
    async fn create_producer(&self, path: &str, kind: PathKind) -> Result<ProducerPtr>;

    /// Create a receiver for the given source.
    async fn create_receiver(&self, source: &ReceiverSource) -> Result<ReceiverPtr>;
}

/// Shared factory pointer.
pub type TransportFactoryPtr = Arc<dyn TransportFactory>;
