// src/config.rs

//! Producer, consumer and request/response settings.
//!
//! These are the static, code-first configuration records consumed when a
//! [`TransportBus`](crate::TransportBus) is built. Each comes with a small
//! fluent builder used from the closures passed to
//! [`TransportBusBuilder`](crate::TransportBusBuilder).

use crate::consumer::BoxedHandler;
use crate::{Address, BusError, Endpoint, MessageType, PathKind, ReceiverSource, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default time a request waits for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Declares that a transport produces a message type.
///
/// Every producer entry contributes to routing (message type → transport) and
/// to path classification (default path / message type → kind).
#[derive(Clone, Debug)]
pub struct ProducerSettings {
    // ---
    /// Message type produced.
    pub message_type: MessageType,

    /// Path used when the caller does not name one.
    pub default_path: Option<Address>,

    /// Whether `default_path` (and this message type) is a queue or a topic.
    pub kind: PathKind,

    /// Per-producer request timeout, overriding the transport default.
    pub timeout: Option<Duration>,
}

/// Fluent builder for [`ProducerSettings`].
pub struct ProducerBuilder {
    settings: ProducerSettings,
}

impl ProducerBuilder {
    pub(crate) fn new(message_type: MessageType) -> Self {
        // ---
        Self {
            settings: ProducerSettings {
                message_type,
                default_path: None,
                kind: PathKind::Topic,
                timeout: None,
            },
        }
    }

    /// Set the default path.
    pub fn default_path(mut self, path: impl Into<Address>) -> Self {
        self.settings.default_path = Some(path.into());
        self
    }

    /// Produce to a queue.
    pub fn to_queue(mut self) -> Self {
        self.settings.kind = PathKind::Queue;
        self
    }

    /// Produce to a topic.
    ///
    /// Default.
    pub fn to_topic(mut self) -> Self {
        self.settings.kind = PathKind::Topic;
        self
    }

    /// Override the request timeout for this message type.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    pub(crate) fn build(self) -> ProducerSettings {
        self.settings
    }
}

/// A configured consumer: one receiver plus the handler it drives.
#[derive(Clone)]
pub struct ConsumerSettings {
    // ---
    /// Queue or topic subscription to receive from.
    pub source: ReceiverSource,

    /// Message type handled.
    pub message_type: MessageType,

    /// Number of concurrent receive loops sharing the receiver.
    pub instances: usize,

    pub(crate) handler: BoxedHandler,
}

impl fmt::Debug for ConsumerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerSettings")
            .field("source", &self.source)
            .field("message_type", &self.message_type)
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for the receiving side of a [`ConsumerSettings`].
#[derive(Default)]
pub struct ConsumerBuilder {
    path: Option<Address>,
    kind: Option<PathKind>,
    subscription: Option<Arc<str>>,
    instances: Option<usize>,
}

impl ConsumerBuilder {
    /// Consume from a queue.
    pub fn queue(mut self, path: impl Into<Address>) -> Self {
        self.path = Some(path.into());
        self.kind = Some(PathKind::Queue);
        self
    }

    /// Consume from a topic. Requires [`subscription`](Self::subscription).
    pub fn topic(mut self, path: impl Into<Address>) -> Self {
        self.path = Some(path.into());
        self.kind = Some(PathKind::Topic);
        self
    }

    /// Subscription name for a topic consumer.
    pub fn subscription(mut self, name: impl Into<Arc<str>>) -> Self {
        self.subscription = Some(name.into());
        self
    }

    /// Number of concurrent handler instances.
    ///
    /// Default: 1.
    pub fn instances(mut self, count: usize) -> Self {
        self.instances = Some(count);
        self
    }

    pub(crate) fn build(
        self,
        message_type: MessageType,
        handler: BoxedHandler,
    ) -> Result<ConsumerSettings> {
        // ---
        let path = self.path.ok_or_else(|| {
            BusError::config(format!(
                "consumer for message type '{message_type}' has no queue or topic"
            ))
        })?;

        let source = match (self.kind, self.subscription) {
            (Some(PathKind::Topic), Some(subscription)) => ReceiverSource::Subscription {
                topic: path,
                subscription,
            },
            (Some(PathKind::Topic), None) => {
                return Err(BusError::config(format!(
                    "topic consumer on '{path}' requires a subscription name"
                )));
            }
            (_, Some(_)) => {
                return Err(BusError::config(format!(
                    "queue consumer on '{path}' cannot have a subscription name"
                )));
            }
            (_, None) => ReceiverSource::Queue { path },
        };

        let instances = self.instances.unwrap_or(1);
        if instances == 0 {
            return Err(BusError::config(format!(
                "consumer on {source} must have at least one instance"
            )));
        }

        Ok(ConsumerSettings {
            source,
            message_type,
            instances,
            handler,
        })
    }
}

/// Enables `send` on a transport: where responses come back and how long to wait.
#[derive(Clone, Debug)]
pub struct RequestResponseSettings {
    // ---
    /// Path responses are addressed to.
    pub reply_to: Endpoint,

    /// Subscription used when `reply_to` is a topic.
    pub subscription: Option<Arc<str>>,

    /// Timeout applied when neither the call nor the producer sets one.
    pub default_timeout: Duration,
}

impl RequestResponseSettings {
    pub(crate) fn source(&self) -> ReceiverSource {
        match (&self.reply_to.kind, &self.subscription) {
            (PathKind::Topic, Some(subscription)) => ReceiverSource::Subscription {
                topic: self.reply_to.path.clone(),
                subscription: subscription.clone(),
            },
            _ => ReceiverSource::Queue {
                path: self.reply_to.path.clone(),
            },
        }
    }
}

/// Fluent builder for [`RequestResponseSettings`].
#[derive(Default)]
pub struct RequestResponseBuilder {
    reply_to: Option<Endpoint>,
    subscription: Option<Arc<str>>,
    default_timeout: Option<Duration>,
}

impl RequestResponseBuilder {
    /// Receive responses on a queue.
    pub fn reply_to_queue(mut self, path: impl Into<Address>) -> Self {
        self.reply_to = Some(Endpoint::new(path, PathKind::Queue));
        self.subscription = None;
        self
    }

    /// Receive responses on a topic through `subscription`.
    pub fn reply_to_topic(mut self, path: impl Into<Address>, subscription: impl Into<Arc<str>>) -> Self {
        self.reply_to = Some(Endpoint::new(path, PathKind::Topic));
        self.subscription = Some(subscription.into());
        self
    }

    /// Set the default response timeout.
    ///
    /// Default: 20s.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub(crate) fn build(self) -> Result<RequestResponseSettings> {
        // ---
        let reply_to = self.reply_to.ok_or_else(|| {
            BusError::config("request/response requires a reply-to queue or topic")
        })?;

        Ok(RequestResponseSettings {
            reply_to,
            subscription: self.subscription,
            default_timeout: self.default_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}
