//! In-memory transport implementation.
//!
//! A pure in-process implementation of [`TransportFactory`]. It is intended
//! for testing, local execution, and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! - A queue delivers each envelope to exactly one of its receivers.
//! - A topic delivers each envelope to every subscription; receivers sharing
//!   one subscription compete for its envelopes like queue receivers do.
//! - A topic envelope published while the topic has no subscription is
//!   dropped. A queue keeps envelopes until a receiver takes them.
//! - Queues and topics live in separate namespaces of the hub.
//!
//! ## Non-Goals
//!
//! This transport does not attempt to emulate the failure modes, persistence,
//! or delivery guarantees of any specific broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::{
    // ---
    log_debug,
    Address,
    BusError,
    Envelope,
    PathKind,
    Producer,
    ProducerPtr,
    Receiver,
    ReceiverPtr,
    ReceiverSource,
    Result,
    TransportFactory,
};

/// One unbounded channel whose receiving half is shared by competing receivers.
#[derive(Clone)]
struct Channel {
    // ---
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Envelope>>>,
}

impl Channel {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

/// Shared broker state for the in-memory transport.
///
/// All [`MemoryTransport`]s that share a hub see each other's queues and
/// topics, exactly as nodes connected to one real broker would. Create one hub
/// per test to keep parallel tests isolated.
#[derive(Default)]
pub struct MemoryHub {
    // ---
    queues: RwLock<HashMap<Address, Channel>>,
    topics: RwLock<HashMap<Address, HashMap<Arc<str>, Channel>>>,
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn queue(&self, path: &Address) -> Channel {
        // ---
        if let Some(channel) = self.queues.read().await.get(path) {
            return channel.clone();
        }

        let mut queues = self.queues.write().await;
        queues.entry(path.clone()).or_insert_with(Channel::new).clone()
    }

    async fn subscription(&self, topic: &Address, subscription: &Arc<str>) -> Channel {
        // ---
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.clone())
            .or_default()
            .entry(subscription.clone())
            .or_insert_with(Channel::new)
            .clone()
    }

    async fn enqueue(&self, env: Envelope) -> Result<()> {
        // ---
        let channel = self.queue(&env.path).await;
        let path = env.path.clone();
        channel
            .tx
            .send(env)
            .map_err(|_| BusError::transport(format!("queue {path} is gone")))
    }

    async fn fan_out(&self, env: Envelope) -> Result<()> {
        // ---
        let topics = self.topics.read().await;
        let Some(subscriptions) = topics.get(&env.path) else {
            log_debug!("topic {} has no subscriptions; dropping envelope", env.path);
            return Ok(());
        };

        for (_name, channel) in subscriptions {
            log_debug!("topic {}: deliver to subscription {_name}", env.path);
            // The hub owns the receiving half, so this cannot fail.
            let _ = channel.tx.send(env.clone());
        }

        Ok(())
    }

    /// Names of the subscriptions registered on a topic.
    pub async fn subscriptions(&self, topic: &str) -> Vec<Arc<str>> {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|subs| subs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// In-memory transport factory.
///
/// Routes envelopes through a [`MemoryHub`]. Factories sharing a hub can
/// exchange messages.
#[derive(Clone)]
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
}

impl MemoryTransport {
    /// Create a transport on a fresh, private hub.
    pub fn new() -> Self {
        Self::with_hub(MemoryHub::new())
    }

    /// Create a transport on a shared hub.
    pub fn with_hub(hub: Arc<MemoryHub>) -> Self {
        Self { hub }
    }

    /// The hub this transport routes through.
    pub fn hub(&self) -> &Arc<MemoryHub> {
        &self.hub
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TransportFactory for MemoryTransport {
    // ---
    async fn create_producer(&self, path: &str, kind: PathKind) -> Result<ProducerPtr> {
        // ---
        log_debug!("memory: create {kind} producer for {path}");

        Ok(Arc::new(MemoryProducer {
            path: Address::from(path),
            kind,
            hub: self.hub.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn create_receiver(&self, source: &ReceiverSource) -> Result<ReceiverPtr> {
        // ---
        log_debug!("memory: create receiver for {source}");

        let channel = match source {
            ReceiverSource::Queue { path } => self.hub.queue(path).await,
            ReceiverSource::Subscription {
                topic,
                subscription,
            } => self.hub.subscription(topic, subscription).await,
        };

        Ok(Arc::new(MemoryReceiver {
            source: source.clone(),
            inbox: channel.rx,
            closed: CancellationToken::new(),
        }))
    }
}

struct MemoryProducer {
    // ---
    path: Address,
    kind: PathKind,
    hub: Arc<MemoryHub>,
    closed: AtomicBool,
}

#[async_trait::async_trait]
impl Producer for MemoryProducer {
    fn path(&self) -> &str {
        self.path.as_str()
    }

    async fn send(&self, mut env: Envelope) -> Result<()> {
        // ---
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::transport(format!(
                "{} producer for {} is closed",
                self.kind, self.path
            )));
        }

        env.path = self.path.clone();
        match self.kind {
            PathKind::Queue => self.hub.enqueue(env).await,
            PathKind::Topic => self.hub.fan_out(env).await,
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryReceiver {
    // ---
    source: ReceiverSource,
    inbox: Arc<Mutex<mpsc::UnboundedReceiver<Envelope>>>,
    closed: CancellationToken,
}

#[async_trait::async_trait]
impl Receiver for MemoryReceiver {
    fn source(&self) -> &ReceiverSource {
        &self.source
    }

    async fn receive(&self) -> Option<Envelope> {
        // ---
        tokio::select! {
            _ = self.closed.cancelled() => None,
            env = async { self.inbox.lock().await.recv().await } => env,
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }
}
