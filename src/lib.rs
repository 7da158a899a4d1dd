//! Message bus that routes traffic across several named transports.
//!
//! A [`HybridBus`] owns a set of [`TransportBus`]es, each bound to one broker
//! connection through a [`TransportFactory`]. Outgoing messages are routed to
//! a transport by their [`MessageType`] (or an explicitly named transport),
//! then classified as queue or topic traffic and handed to a lazily created,
//! per-path producer client.
//!
//! ```no_run
//! use hybrid_bus::{HybridBusBuilder, MemoryTransport, Message, MessageType};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct OrderPlaced {
//!     id: u64,
//! }
//!
//! impl Message for OrderPlaced {
//!     const MESSAGE_TYPE: MessageType = MessageType::new("OrderPlaced");
//! }
//!
//! # async fn example() -> hybrid_bus::Result<()> {
//! let bus = HybridBusBuilder::new()
//!     .add_bus("orders", |b| {
//!         b.transport(MemoryTransport::new())
//!             .produce::<OrderPlaced>(|p| p.default_path("orders").to_queue())
//!     })
//!     .build()
//!     .await?;
//!
//! bus.publish(&OrderPlaced { id: 1 }, None).await?;
//! bus.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod macros;

mod client_cache;
mod config;
mod consumer;
mod correlation;
mod domain;
mod error;
mod hybrid_bus;
mod hybrid_bus_builder;
mod path_kind;
mod pending;
mod router;
mod serializer;
mod transport;
mod transport_bus;
mod transport_bus_builder;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use hybrid_bus::{BusState, HybridBus};
pub use hybrid_bus_builder::HybridBusBuilder;
pub use transport_bus::{SendOptions, TransportBus};
pub use transport_bus_builder::TransportBusBuilder;

pub use client_cache::{ClientCache, CreateClientFn};
pub use config::{
    // ---
    ConsumerBuilder,
    ConsumerSettings,
    ProducerBuilder,
    ProducerSettings,
    RequestResponseBuilder,
    RequestResponseSettings,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use consumer::{ConsumerRegistry, DEFAULT_STOP_GRACE};
pub use path_kind::PathKindIndex;
pub use router::MessageTypeRouter;

pub use correlation::CorrelationId;
pub use error::{BusError, Result};
pub use serializer::{JsonSerializer, MessageSerializer, SerializerPtr};

pub use transport::{MemoryHub, MemoryTransport};

// --- public re-exports
pub use domain::{
    //
    Address,
    Endpoint,
    Envelope,
    Lineage,
    Message,
    MessageType,
    PathKind,
    Producer,
    ProducerPtr,
    Receiver,
    ReceiverPtr,
    ReceiverSource,
    Request,
    TransportFactory,
    TransportFactoryPtr,
};

// Token accepted by `SendOptions::cancellation`
pub use tokio_util::sync::CancellationToken;
