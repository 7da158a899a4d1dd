//! Transport implementations.
//!
//! Concrete implementations of the domain-level [`TransportFactory`](crate::TransportFactory)
//! trait. The bus itself never depends on transport-specific types.

mod memory;

pub use memory::{MemoryHub, MemoryTransport};
