// src/transport_bus_builder.rs

//! Transport bus builder.
//!
//! Provides a fluent builder API for declaring what one named transport
//! produces and consumes. Configuration mistakes are collected while building
//! and reported by [`build`](TransportBusBuilder::build), so the closures passed
//! to [`HybridBusBuilder::add_bus`](crate::HybridBusBuilder::add_bus) can stay
//! plain chains.

use crate::config::{
    // ---
    ConsumerBuilder,
    ConsumerSettings,
    ProducerBuilder,
    ProducerSettings,
    RequestResponseBuilder,
    RequestResponseSettings,
};
use crate::consumer::{wrap_event_handler, wrap_request_handler, DEFAULT_STOP_GRACE};
use crate::{
    // ---
    BusError,
    JsonSerializer,
    Message,
    Request,
    Result,
    SerializerPtr,
    TransportBus,
    TransportFactory,
    TransportFactoryPtr,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Builder for one [`TransportBus`].
///
/// # Examples
///
/// ```no_run
/// use hybrid_bus::{Message, MessageType, MemoryTransport, TransportBusBuilder};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct OrderPlaced {
///     id: u64,
/// }
///
/// impl Message for OrderPlaced {
///     const MESSAGE_TYPE: MessageType = MessageType::new("OrderPlaced");
/// }
///
/// # async fn example() -> hybrid_bus::Result<()> {
/// let bus = TransportBusBuilder::new("orders")
///     .transport(MemoryTransport::new())
///     .produce::<OrderPlaced>(|p| p.default_path("orders").to_queue())
///     .consume::<OrderPlaced, _, _>(|c| c.queue("orders").instances(2), |order| async move {
///         println!("order {}", order.id);
///         Ok(())
///     })
///     .build()
///     .await?;
///
/// bus.publish(&OrderPlaced { id: 7 }, None).await?;
/// bus.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct TransportBusBuilder {
    // ---
    name: Arc<str>,
    factory: Option<TransportFactoryPtr>,
    serializer: Option<SerializerPtr>,
    producers: Vec<ProducerSettings>,
    consumers: Vec<ConsumerSettings>,
    request_response: Option<RequestResponseSettings>,

    // Consumer stop grace period (optional, default: 5s)
    stop_grace: Option<Duration>,

    // First configuration error, reported by build()
    error: Option<BusError>,
}

impl TransportBusBuilder {
    /// Create a builder for the transport called `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        // ---
        Self {
            name: name.into(),
            factory: None,
            serializer: None,
            producers: Vec::new(),
            consumers: Vec::new(),
            request_response: None,
            stop_grace: None,
            error: None,
        }
    }

    /// Name of the transport being built.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the transport factory. Required.
    pub fn transport(self, factory: impl TransportFactory + 'static) -> Self {
        self.transport_ptr(Arc::new(factory))
    }

    /// Set an already shared transport factory.
    pub fn transport_ptr(mut self, factory: TransportFactoryPtr) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the serializer.
    ///
    /// Default: [`JsonSerializer`].
    pub fn serializer(mut self, serializer: SerializerPtr) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Declare that this transport produces `M`.
    pub fn produce<M: Message>(mut self, configure: impl FnOnce(ProducerBuilder) -> ProducerBuilder) -> Self {
        // ---
        let settings = configure(ProducerBuilder::new(M::MESSAGE_TYPE)).build();
        self.producers.push(settings);
        self
    }

    /// Consume `M` with `handler`.
    pub fn consume<M, F, Fut>(
        self,
        configure: impl FnOnce(ConsumerBuilder) -> ConsumerBuilder,
        handler: F,
    ) -> Self
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        // ---
        let built = configure(ConsumerBuilder::default())
            .build(M::MESSAGE_TYPE, wrap_event_handler(handler));
        self.push_consumer(built)
    }

    /// Handle requests of type `R`; the handler's result is sent back to the
    /// requester.
    pub fn handle<R, F, Fut>(
        self,
        configure: impl FnOnce(ConsumerBuilder) -> ConsumerBuilder,
        handler: F,
    ) -> Self
    where
        R: Request,
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R::Response>> + Send + 'static,
    {
        // ---
        let built = configure(ConsumerBuilder::default())
            .build(R::MESSAGE_TYPE, wrap_request_handler(handler));
        self.push_consumer(built)
    }

    /// Enable [`send`](TransportBus::send) on this transport.
    pub fn expect_request_responses(
        mut self,
        configure: impl FnOnce(RequestResponseBuilder) -> RequestResponseBuilder,
    ) -> Self {
        // ---
        match configure(RequestResponseBuilder::default()).build() {
            Ok(settings) => self.request_response = Some(settings),
            Err(err) => self.record(err),
        }
        self
    }

    /// Time running handlers get to finish on shutdown before being aborted.
    ///
    /// Default: 5s.
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = Some(grace);
        self
    }

    /// Build the transport bus (consumes self).
    ///
    /// Creates a receiver for every consumer and starts its loops. Producer
    /// clients are created lazily on first use.
    ///
    /// # Errors
    ///
    /// [`BusError::Configuration`] for an invalid declaration, a missing
    /// transport factory, or a path or message type declared both as queue and
    /// as topic. Receiver creation failures are returned as reported by the
    /// factory.
    pub async fn build(self) -> Result<TransportBus> {
        // ---
        if let Some(err) = self.error {
            return Err(err);
        }

        let factory = self.factory.ok_or_else(|| {
            BusError::config(format!("bus {} has no transport factory", self.name))
        })?;

        let serializer = self
            .serializer
            .unwrap_or_else(|| Arc::new(JsonSerializer) as SerializerPtr);

        TransportBus::start(
            self.name,
            factory,
            serializer,
            self.producers,
            self.consumers,
            self.request_response,
            self.stop_grace.unwrap_or(DEFAULT_STOP_GRACE),
        )
        .await
    }

    fn push_consumer(mut self, built: Result<ConsumerSettings>) -> Self {
        match built {
            Ok(settings) => self.consumers.push(settings),
            Err(err) => self.record(err),
        }
        self
    }

    fn record(&mut self, err: BusError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
