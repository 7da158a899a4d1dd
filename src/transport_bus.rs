// src/transport_bus.rs

//! One named transport owned by a [`HybridBus`](crate::HybridBus).
//!
//! A `TransportBus` wraps a [`TransportFactory`](crate::TransportFactory) with:
//! - a [`PathKindIndex`] that decides whether an outgoing path is a queue or
//!   a topic
//! - two [`ClientCache`]s, one per kind, so each path gets one producer
//! - a [`ConsumerRegistry`] driving the configured handlers
//! - optional request/response support: a response consumer plus the table
//!   of requests waiting for it
//!
//! Instances are created with [`TransportBusBuilder`](crate::TransportBusBuilder)
//! and are cheap to clone.

use crate::client_cache::{ClientCache, CreateClientFn};
use crate::config::{ConsumerSettings, ProducerSettings, RequestResponseSettings};
use crate::consumer::{wrap_response_handler, ConsumerRegistry, DispatchContext, ReplySink};
use crate::path_kind::PathKindIndex;
use crate::pending::PendingRequests;
use crate::serializer::{decode, encode};
use crate::{
    // ---
    Address,
    BusError,
    CorrelationId,
    Endpoint,
    Envelope,
    Message,
    MessageType,
    PathKind,
    ReceiverSource,
    Request,
    Result,
    SerializerPtr,
    TransportFactoryPtr,
};
use bytes::Bytes;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Message type of the built-in response consumer.
const RESPONSE: MessageType = MessageType::new("response");

/// Per-call options for [`send`](crate::HybridBus::send).
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    // ---
    /// Transport to use instead of the routed one.
    pub bus: Option<String>,

    /// Path to use instead of the producer's default path.
    pub path: Option<String>,

    /// Response timeout overriding the producer and transport defaults.
    pub timeout: Option<Duration>,

    /// Token that abandons the wait when cancelled.
    pub cancellation: Option<CancellationToken>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(mut self, name: impl Into<String>) -> Self {
        self.bus = Some(name.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Everything needed to put an envelope on the wire.
///
/// Shared with the receive loops, which use it to deliver responses.
struct Outbound {
    // ---
    bus_name: Arc<str>,
    kinds: PathKindIndex,
    queues: ClientCache,
    topics: ClientCache,
}

impl Outbound {
    fn cache(&self, kind: PathKind) -> &ClientCache {
        match kind {
            PathKind::Queue => &self.queues,
            PathKind::Topic => &self.topics,
        }
    }

    async fn send(&self, kind: PathKind, env: Envelope) -> Result<()> {
        // ---
        let client = self.cache(kind).get_or_create(&env.path).await?;
        client.send(env).await
    }
}

#[async_trait::async_trait]
impl ReplySink for Outbound {
    async fn reply(&self, to: &Endpoint, env: Envelope) -> Result<()> {
        crate::log_debug!("{}: replying on {} {}", self.bus_name, to.kind, to.path);
        self.send(to.kind, env).await
    }
}

/// A single named transport.
#[derive(Clone)]
pub struct TransportBus {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    name: Arc<str>,
    serializer: SerializerPtr,
    producers: HashMap<MessageType, ProducerSettings>,
    outbound: Arc<Outbound>,
    consumers: ConsumerRegistry,

    // Request/response state, present when enabled
    request_response: Option<RequestResponseSettings>,
    pending: Arc<PendingRequests>,

    shut_down: AtomicBool,
}

impl TransportBus {
    /// Validate the settings, start the consumers and return the ready bus.
    pub(crate) async fn start(
        name: Arc<str>,
        factory: TransportFactoryPtr,
        serializer: SerializerPtr,
        producers: Vec<ProducerSettings>,
        mut consumers: Vec<ConsumerSettings>,
        request_response: Option<RequestResponseSettings>,
        stop_grace: Duration,
    ) -> Result<Self> {
        // ---
        let mut kinds = PathKindIndex::from_producers(&producers)?;

        let mut by_type = HashMap::with_capacity(producers.len());
        for producer in producers {
            let message_type = producer.message_type;
            if by_type.insert(message_type, producer).is_some() {
                return Err(BusError::config(format!(
                    "bus {name} declares more than one producer for message type '{message_type}'"
                )));
            }
        }

        let pending = Arc::new(PendingRequests::new());
        if let Some(settings) = &request_response {
            kinds.register_path(settings.reply_to.path.clone(), settings.reply_to.kind)?;
            consumers.push(ConsumerSettings {
                source: settings.source(),
                message_type: RESPONSE,
                instances: 1,
                handler: wrap_response_handler(pending.clone()),
            });
        }

        let outbound = Arc::new(Outbound {
            bus_name: name.clone(),
            kinds,
            queues: ClientCache::new("queue", create_fn(&factory, PathKind::Queue)),
            topics: ClientCache::new("topic", create_fn(&factory, PathKind::Topic)),
        });

        let ctx = Arc::new(DispatchContext {
            bus_name: name.clone(),
            serializer: serializer.clone(),
            replies: outbound.clone(),
        });

        let consumers = ConsumerRegistry::start(consumers, &factory, ctx, stop_grace).await?;

        crate::log_info!(
            "{name}: ready ({} producer(s), {} consumer(s))",
            by_type.len(),
            consumers.len()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                serializer,
                producers: by_type,
                outbound,
                consumers,
                request_response,
                pending,
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Name of this transport.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Producer settings declared on this transport.
    pub fn producers(&self) -> impl Iterator<Item = &ProducerSettings> {
        self.inner.producers.values()
    }

    /// Sources of the running consumers, including the response consumer.
    pub fn consumer_sources(&self) -> Vec<ReceiverSource> {
        self.inner.consumers.sources()
    }

    /// Queue or topic classification used for `path`.
    pub fn path_kind(&self, path: &str, message_type: Option<&MessageType>) -> PathKind {
        self.inner.outbound.kinds.classify(path, message_type)
    }

    /// Number of cached producer clients of the given kind.
    pub fn client_count(&self, kind: PathKind) -> usize {
        self.inner.outbound.cache(kind).len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Publish `message` to `path`, or to the producer's default path.
    ///
    /// # Errors
    ///
    /// [`BusError::Routing`] if no path is given and no producer for the
    /// message type (or an ancestor) declares a default path. Transport
    /// failures are returned as-is, without retry.
    pub async fn publish<M: Message>(&self, message: &M, path: Option<&str>) -> Result<()> {
        // ---
        self.ensure_open()?;

        let message_type = M::MESSAGE_TYPE;
        let path = self.resolve_path(&message_type, path)?;
        let payload = encode(self.inner.serializer.as_ref(), message)?;

        self.deliver(path, &message_type, payload).await
    }

    /// Deliver an already-serialized payload to `path`.
    pub async fn deliver(&self, path: Address, message_type: &MessageType, payload: Bytes) -> Result<()> {
        // ---
        self.ensure_open()?;

        let env = Envelope::message(path, Arc::from(message_type.name()), payload);
        self.deliver_envelope(env, message_type).await
    }

    /// Send a request and wait for its response.
    ///
    /// The response timeout is taken from `options`, else from the producer
    /// settings, else from the request/response settings. The timeout and the
    /// cancellation token also bound client creation and delivery.
    ///
    /// # Errors
    ///
    /// - [`BusError::Configuration`] if request/response is not enabled
    /// - [`BusError::Timeout`] if delivery and response do not finish in time
    /// - [`BusError::Cancelled`] if the cancellation token fires first
    /// - [`BusError::Handler`] if the remote handler failed
    /// - [`BusError::ShuttingDown`] if the bus shuts down while waiting
    pub async fn send<R: Request>(&self, request: &R, options: &SendOptions) -> Result<R::Response> {
        // ---
        self.ensure_open()?;

        let settings = self.inner.request_response.as_ref().ok_or_else(|| {
            BusError::config(format!(
                "bus {} is not configured for request/response",
                self.inner.name
            ))
        })?;

        let message_type = R::MESSAGE_TYPE;
        let path = self.resolve_path(&message_type, options.path.as_deref())?;
        let timeout = options
            .timeout
            .or_else(|| self.producer_for(&message_type).and_then(|p| p.timeout))
            .unwrap_or(settings.default_timeout);

        if options.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(BusError::Cancelled);
        }

        let payload = encode(self.inner.serializer.as_ref(), request)?;
        let correlation_id = CorrelationId::generate();
        let env = Envelope::request(
            path,
            Arc::from(message_type.name()),
            payload,
            correlation_id.to_shared(),
            settings.reply_to.clone(),
        );

        // One deadline covers client creation, delivery and the response wait.
        let deadline = tokio::time::Instant::now() + timeout;

        // Register before delivery so a fast response cannot be missed.
        let rx = self.inner.pending.register(correlation_id.clone());

        let exchange = async {
            self.deliver_envelope(env, &message_type).await?;
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(BusError::ShuttingDown(self.inner.name.to_string())),
            }
        };

        let cancelled = async {
            match &options.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            outcome = exchange => outcome,
            _ = tokio::time::sleep_until(deadline) => {
                crate::log_debug!("{}: request {correlation_id} timed out after {timeout:?}", self.inner.name);
                Err(BusError::Timeout)
            }
            _ = cancelled => {
                crate::log_debug!("{}: request {correlation_id} cancelled", self.inner.name);
                Err(BusError::Cancelled)
            }
        };

        match outcome {
            Ok(payload) => decode(self.inner.serializer.as_ref(), &payload),
            Err(err) => {
                self.inner.pending.remove(&correlation_id);
                Err(err)
            }
        }
    }

    /// Stop consumers, fail pending requests and close every cached client.
    ///
    /// Each step runs even if an earlier one failed. Failures are logged and
    /// returned; nothing is raised. Calling this more than once is a no-op.
    pub async fn shutdown(&self) -> Vec<BusError> {
        // ---
        let name = &self.inner.name;
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            crate::log_debug!("{name}: already shut down");
            return Vec::new();
        }

        crate::log_info!("{name}: shutting down");

        let mut failures = self.inner.consumers.stop_all().await;

        let failed = self.inner.pending.fail_all(name);
        if failed > 0 {
            crate::log_warn!("{name}: failed {failed} pending request(s)");
        }

        failures.extend(self.inner.outbound.queues.close_all().await);
        failures.extend(self.inner.outbound.topics.close_all().await);

        for failure in &failures {
            crate::log_error!("{name}: {failure}");
        }
        crate::log_info!("{name}: shut down with {} failure(s)", failures.len());

        failures
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(BusError::ShuttingDown(self.inner.name.to_string()));
        }
        Ok(())
    }

    fn producer_for(&self, message_type: &MessageType) -> Option<&ProducerSettings> {
        message_type
            .lineage()
            .find_map(|t| self.inner.producers.get(&t))
    }

    fn resolve_path(&self, message_type: &MessageType, explicit: Option<&str>) -> Result<Address> {
        // ---
        if let Some(path) = explicit {
            return Ok(Address::from(path));
        }

        self.producer_for(message_type)
            .and_then(|p| p.default_path.clone())
            .ok_or_else(|| BusError::Routing {
                message_type: message_type.name().to_string(),
                name: Some(self.inner.name.to_string()),
            })
    }

    async fn deliver_envelope(&self, env: Envelope, message_type: &MessageType) -> Result<()> {
        // ---
        let kind = self.inner.outbound.kinds.classify(env.path.as_str(), Some(message_type));
        crate::log_debug!(
            "{}: producing {message_type} to {kind} {}",
            self.inner.name,
            env.path
        );

        self.inner.outbound.send(kind, env).await
    }
}

fn create_fn(factory: &TransportFactoryPtr, kind: PathKind) -> CreateClientFn {
    // ---
    let factory = factory.clone();
    Arc::new(move |path: Address| {
        let factory = factory.clone();
        async move { factory.create_producer(path.as_str(), kind).await }.boxed()
    })
}
