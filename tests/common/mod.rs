#![allow(dead_code)]

use hybrid_bus::{
    //
    BusError,
    Envelope,
    MemoryTransport,
    Message,
    MessageType,
    PathKind,
    Producer,
    ProducerPtr,
    Receiver,
    ReceiverPtr,
    ReceiverSource,
    Request,
    Result,
    TransportFactory,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub fn init_tracing() {
    // ---
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait for the next item a handler forwarded, failing the test after a second.
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("handler channel closed")
}

/// True if nothing arrives within a short window.
pub async fn nothing_arrives<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> bool {
    tokio::time::timeout(Duration::from_millis(100), rx.recv())
        .await
        .is_err()
}

// --- messages

pub const ORDER_EVENT: MessageType = MessageType::new("OrderEvent");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: u64,
}

impl Message for OrderEvent {
    const MESSAGE_TYPE: MessageType = ORDER_EVENT;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub id: u64,
}

impl Message for OrderCreated {
    const MESSAGE_TYPE: MessageType = MessageType::derived("OrderCreated", &ORDER_EVENT);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub id: u64,
}

impl Message for OrderShipped {
    const MESSAGE_TYPE: MessageType = MessageType::derived("OrderShipped", &ORDER_EVENT);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTaken {
    pub amount: u32,
}

impl Message for PaymentTaken {
    const MESSAGE_TYPE: MessageType = MessageType::new("PaymentTaken");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReserved {
    pub sku: String,
}

impl Message for StockReserved {
    const MESSAGE_TYPE: MessageType = MessageType::new("StockReserved");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReleased {
    pub sku: String,
}

impl Message for StockReleased {
    const MESSAGE_TYPE: MessageType = MessageType::new("StockReleased");
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Add {
    pub a: i32,
    pub b: i32,
}

impl Message for Add {
    const MESSAGE_TYPE: MessageType = MessageType::new("Add");
}

impl Request for Add {
    type Response = i32;
}

/// Request whose handler sleeps for `millis` before answering.
#[derive(Debug, Serialize, Deserialize)]
pub struct Slow {
    pub millis: u64,
}

impl Message for Slow {
    const MESSAGE_TYPE: MessageType = MessageType::new("Slow");
}

impl Request for Slow {
    type Response = String;
}

/// Request whose handler always fails.
#[derive(Debug, Serialize, Deserialize)]
pub struct Explode;

impl Message for Explode {
    const MESSAGE_TYPE: MessageType = MessageType::new("Explode");
}

impl Request for Explode {
    type Response = ();
}

// --- recording transport

/// What a recorded close call released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Closed {
    Consumer,
    Queue,
    Topic,
}

type CloseLog = Arc<Mutex<Vec<(Closed, String)>>>;

/// Memory transport that records producer creation plus producer and
/// receiver close calls, and can be told to fail closing one path.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    // ---
    inner: MemoryTransport,
    fail_close_on: Option<String>,
    created: Arc<Mutex<Vec<(String, PathKind)>>>,
    closes: CloseLog,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_close_on(path: &str) -> Self {
        Self {
            fail_close_on: Some(path.to_string()),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<(String, PathKind)> {
        self.created.lock().unwrap().clone()
    }

    /// Paths of closed producers, sorted.
    pub fn closed(&self) -> Vec<String> {
        let mut closed: Vec<String> = self
            .close_log()
            .into_iter()
            .filter(|(what, _)| *what != Closed::Consumer)
            .map(|(_, path)| path)
            .collect();
        closed.sort();
        closed
    }

    /// Every close call in the order it happened.
    pub fn close_log(&self) -> Vec<(Closed, String)> {
        self.closes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TransportFactory for RecordingTransport {
    async fn create_producer(&self, path: &str, kind: PathKind) -> Result<ProducerPtr> {
        // ---
        self.created.lock().unwrap().push((path.to_string(), kind));
        let inner = self.inner.create_producer(path, kind).await?;

        Ok(Arc::new(RecordingProducer {
            inner,
            kind: match kind {
                PathKind::Queue => Closed::Queue,
                PathKind::Topic => Closed::Topic,
            },
            fail_close: self.fail_close_on.as_deref() == Some(path),
            closes: self.closes.clone(),
        }))
    }

    async fn create_receiver(&self, source: &ReceiverSource) -> Result<ReceiverPtr> {
        let inner = self.inner.create_receiver(source).await?;
        Ok(Arc::new(RecordingReceiver {
            inner,
            closes: self.closes.clone(),
        }))
    }
}

struct RecordingProducer {
    // ---
    inner: ProducerPtr,
    kind: Closed,
    fail_close: bool,
    closes: CloseLog,
}

#[async_trait::async_trait]
impl Producer for RecordingProducer {
    fn path(&self) -> &str {
        self.inner.path()
    }

    async fn send(&self, env: Envelope) -> Result<()> {
        self.inner.send(env).await
    }

    async fn close(&self) -> Result<()> {
        // ---
        self.closes.lock().unwrap().push((self.kind, self.path().to_string()));
        self.inner.close().await?;
        if self.fail_close {
            return Err(BusError::transport(format!("close of {} refused", self.path())));
        }
        Ok(())
    }
}

struct RecordingReceiver {
    // ---
    inner: ReceiverPtr,
    closes: CloseLog,
}

#[async_trait::async_trait]
impl Receiver for RecordingReceiver {
    fn source(&self) -> &ReceiverSource {
        self.inner.source()
    }

    async fn receive(&self) -> Option<Envelope> {
        self.inner.receive().await
    }

    async fn close(&self) -> Result<()> {
        // ---
        self.closes
            .lock()
            .unwrap()
            .push((Closed::Consumer, self.source().to_string()));
        self.inner.close().await
    }
}

/// Factory whose receivers can never be created.
pub struct BrokenReceivers;

#[async_trait::async_trait]
impl TransportFactory for BrokenReceivers {
    async fn create_producer(&self, path: &str, kind: PathKind) -> Result<ProducerPtr> {
        MemoryTransport::new().create_producer(path, kind).await
    }

    async fn create_receiver(&self, source: &ReceiverSource) -> Result<ReceiverPtr> {
        Err(BusError::transport(format!("cannot attach to {source}")))
    }
}
