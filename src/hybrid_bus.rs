// src/hybrid_bus.rs

//! Multi-transport message bus.
//!
//! A [`HybridBus`] owns several named [`TransportBus`]es and routes each
//! outgoing message to one of them: the transport named by the caller if
//! any, otherwise the transport whose producers declare the message type (or
//! its nearest ancestor).

use crate::{
    // ---
    BusError,
    Message,
    MessageTypeRouter,
    Request,
    Result,
    SendOptions,
    TransportBus,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of a [`HybridBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusState {
    /// Accepting `publish` and `send`.
    Ready,
    /// `shutdown` is in progress; new calls are rejected.
    ShuttingDown,
    /// Every transport has been shut down.
    Disposed,
}

impl BusState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BusState::Ready,
            1 => BusState::ShuttingDown,
            _ => BusState::Disposed,
        }
    }
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusState::Ready => f.write_str("ready"),
            BusState::ShuttingDown => f.write_str("shutting down"),
            BusState::Disposed => f.write_str("disposed"),
        }
    }
}

/// Message bus spanning several named transports.
///
/// Cheap to clone; clones share the same transports.
#[derive(Clone)]
pub struct HybridBus {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    buses: HashMap<Arc<str>, TransportBus>,
    router: MessageTypeRouter,
    state: AtomicU8,
}

impl HybridBus {
    /// Create a ready bus over already built transports (internal use by
    /// `HybridBusBuilder`).
    pub(crate) fn new(buses: Vec<TransportBus>, router: MessageTypeRouter) -> Self {
        // ---
        let buses = buses
            .into_iter()
            .map(|bus| (Arc::from(bus.name()), bus))
            .collect();

        Self {
            inner: Arc::new(Inner {
                buses,
                router,
                state: AtomicU8::new(BusState::Ready as u8),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BusState {
        BusState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Look up a transport by name.
    pub fn bus(&self, name: &str) -> Option<&TransportBus> {
        self.inner.buses.get(name)
    }

    /// Names of the owned transports, in no particular order.
    pub fn bus_names(&self) -> impl Iterator<Item = &str> {
        self.inner.buses.keys().map(|name| &**name)
    }

    /// The route table computed at build time.
    pub fn router(&self) -> &MessageTypeRouter {
        &self.inner.router
    }

    /// Publish `message` to its default path.
    ///
    /// `bus` overrides routing. With no override the transport is resolved
    /// from the message type.
    ///
    /// # Errors
    ///
    /// - [`BusError::UnknownBus`] if `bus` names no transport
    /// - [`BusError::Routing`] if no transport (or default path) is found
    /// - [`BusError::ShuttingDown`] once shutdown has begun
    pub async fn publish<M: Message>(&self, message: &M, bus: Option<&str>) -> Result<()> {
        // ---
        let target = self.route::<M>(bus)?;
        target.publish(message, None).await
    }

    /// Publish `message` to an explicit `path`.
    pub async fn publish_to<M: Message>(&self, message: &M, path: &str, bus: Option<&str>) -> Result<()> {
        // ---
        let target = self.route::<M>(bus)?;
        target.publish(message, Some(path)).await
    }

    /// Send a request and wait for its response.
    ///
    /// See [`TransportBus::send`] for timeout resolution and error cases.
    pub async fn send<R: Request>(&self, request: &R, options: SendOptions) -> Result<R::Response> {
        // ---
        let target = self.route::<R>(options.bus.as_deref())?;
        target.send(request, &options).await
    }

    /// Shut down every transport.
    ///
    /// Transports are shut down concurrently and independently; failures are
    /// logged, not returned. Calls after the first are no-ops.
    pub async fn shutdown(&self) {
        // ---
        let started = self.inner.state.compare_exchange(
            BusState::Ready as u8,
            BusState::ShuttingDown as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if started.is_err() {
            crate::log_debug!("hybrid bus already {}", self.state());
            return;
        }

        crate::log_info!("shutting down {} transport(s)", self.inner.buses.len());

        let outcomes = join_all(self.inner.buses.values().map(|bus| bus.shutdown())).await;
        let failures: usize = outcomes.iter().map(Vec::len).sum();

        self.inner
            .state
            .store(BusState::Disposed as u8, Ordering::SeqCst);
        crate::log_info!("hybrid bus disposed ({failures} close failure(s))");
    }

    fn route<M: Message>(&self, explicit: Option<&str>) -> Result<&TransportBus> {
        // ---
        if self.state() != BusState::Ready {
            return Err(BusError::ShuttingDown("hybrid".to_string()));
        }

        let message_type = M::MESSAGE_TYPE;
        let name = match explicit {
            Some(name) => name,
            None => self.inner.router.resolve(&message_type, None)?,
        };

        self.inner.buses.get(name).ok_or_else(|| {
            crate::log_warn!("no bus named {name} for message type {message_type}");
            BusError::UnknownBus(name.to_string())
        })
    }
}
