// src/hybrid_bus_builder.rs

//! Hybrid bus builder.

use crate::{
    // ---
    BusError,
    HybridBus,
    MessageTypeRouter,
    Result,
    SerializerPtr,
    TransportBus,
    TransportBusBuilder,
};
use futures::future::join_all;
use std::collections::HashSet;

type ConfigureBus = Box<dyn FnOnce(TransportBusBuilder) -> TransportBusBuilder + Send>;

/// Builder for [`HybridBus`].
///
/// Each transport is declared with a name and a closure configuring its
/// [`TransportBusBuilder`]. Transports are built in declaration order, then
/// the route table is computed from their producers.
///
/// # Examples
///
/// ```no_run
/// use hybrid_bus::{HybridBusBuilder, MemoryTransport};
///
/// # async fn example() -> hybrid_bus::Result<()> {
/// let bus = HybridBusBuilder::new()
///     .add_bus("primary", |b| b.transport(MemoryTransport::new()))
///     .add_bus("secondary", |b| b.transport(MemoryTransport::new()))
///     .strict_routing(true)
///     .build()
///     .await?;
///
/// bus.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct HybridBusBuilder {
    // ---
    buses: Vec<(String, ConfigureBus)>,

    // Serializer handed to every transport that does not set its own
    serializer: Option<SerializerPtr>,

    // Reject message types produced by more than one transport (default: false)
    strict_routing: bool,
}

impl HybridBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a transport called `name`.
    pub fn add_bus<F>(mut self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(TransportBusBuilder) -> TransportBusBuilder + Send + 'static,
    {
        self.buses.push((name.into(), Box::new(configure)));
        self
    }

    /// Serializer for every transport that does not set its own.
    pub fn serializer(mut self, serializer: SerializerPtr) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Treat a message type produced by more than one transport as a
    /// configuration error instead of routing it to the last one declared.
    pub fn strict_routing(mut self, strict: bool) -> Self {
        self.strict_routing = strict;
        self
    }

    /// Build every transport and the route table (consumes self).
    ///
    /// # Errors
    ///
    /// [`BusError::Configuration`] for duplicate transport names, any
    /// transport configuration error, or (with strict routing) a message type
    /// produced by more than one transport. Transports built before the
    /// failure are shut down again.
    pub async fn build(self) -> Result<HybridBus> {
        // ---
        let mut seen = HashSet::new();
        for (name, _) in &self.buses {
            if !seen.insert(name.as_str()) {
                return Err(BusError::config(format!("bus name '{name}' is declared more than once")));
            }
        }

        crate::log_info!("building {} transport(s)", self.buses.len());

        let mut built: Vec<TransportBus> = Vec::with_capacity(self.buses.len());
        for (name, configure) in self.buses {
            let mut builder = TransportBusBuilder::new(name.as_str());
            if let Some(serializer) = &self.serializer {
                builder = builder.serializer(serializer.clone());
            }

            match configure(builder).build().await {
                Ok(bus) => built.push(bus),
                Err(err) => {
                    crate::log_error!("failed to build bus {name}: {err}");
                    shutdown_all(&built).await;
                    return Err(err);
                }
            }
        }

        let router = MessageTypeRouter::build(
            built.iter().map(|bus| (bus.name(), bus.producers())),
            self.strict_routing,
        );

        let router = match router {
            Ok(router) => router,
            Err(err) => {
                shutdown_all(&built).await;
                return Err(err);
            }
        };

        crate::log_info!("hybrid bus ready: {} routed message type(s)", router.len());
        Ok(HybridBus::new(built, router))
    }
}

async fn shutdown_all(buses: &[TransportBus]) {
    join_all(buses.iter().map(|bus| bus.shutdown())).await;
}
