//! Domain layer public interface.
//!
//! Defines the message identity model and the transport collaborator
//! interface. Nothing here depends on a concrete broker.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod message;
mod transport;

// --- Message domain re-exports ---

pub use message::{
    //
    Lineage,
    Message,
    MessageType,
    Request,
};

// --- Transport domain re-exports ---

pub use transport::{
    //
    Address,
    Endpoint,
    Envelope,
    PathKind,
    Producer,
    ProducerPtr,
    Receiver,
    ReceiverPtr,
    ReceiverSource,
    TransportFactory,
    TransportFactoryPtr,
};
