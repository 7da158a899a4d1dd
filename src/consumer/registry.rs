// src/consumer/registry.rs

use super::runner::{spawn_loop, DispatchContext};
use crate::config::ConsumerSettings;
use crate::pending::lock_ignore_poison;
use crate::{BusError, ReceiverPtr, ReceiverSource, Result, TransportFactoryPtr};
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default time a consumer gets to finish in-flight work when stopping.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// One running consumer: its receiver and the loops draining it.
struct ConsumerHandle {
    // ---
    source: ReceiverSource,
    receiver: ReceiverPtr,
    stop: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Active consumers of one transport.
///
/// Membership is fixed when the registry is started; the only later change is
/// [`stop_all`](Self::stop_all) emptying it.
pub struct ConsumerRegistry {
    // ---
    bus_name: Arc<str>,
    stop_grace: Duration,
    handles: Mutex<Vec<ConsumerHandle>>,
}

impl ConsumerRegistry {
    /// Create a receiver per consumer setting and start its loops.
    ///
    /// If any receiver cannot be created, the consumers already started are
    /// stopped again and the error is returned.
    pub(crate) async fn start(
        settings: Vec<ConsumerSettings>,
        factory: &TransportFactoryPtr,
        ctx: Arc<DispatchContext>,
        stop_grace: Duration,
    ) -> Result<Self> {
        // ---
        let registry = Self {
            bus_name: ctx.bus_name.clone(),
            stop_grace,
            handles: Mutex::new(Vec::with_capacity(settings.len())),
        };

        crate::log_info!("{}: creating {} consumer(s)", registry.bus_name, settings.len());

        for consumer in settings {
            crate::log_info!(
                "{}: creating consumer for {} ({}, {} instance(s))",
                registry.bus_name,
                consumer.source,
                consumer.message_type,
                consumer.instances
            );

            let receiver = match factory.create_receiver(&consumer.source).await {
                Ok(receiver) => receiver,
                Err(err) => {
                    crate::log_error!(
                        "{}: failed to create consumer for {}: {err}",
                        registry.bus_name,
                        consumer.source
                    );
                    registry.stop_all().await;
                    return Err(err);
                }
            };

            let stop = CancellationToken::new();
            let tasks = (0..consumer.instances)
                .map(|instance| {
                    spawn_loop(
                        ctx.clone(),
                        receiver.clone(),
                        consumer.handler.clone(),
                        stop.clone(),
                        instance,
                    )
                })
                .collect();

            lock_ignore_poison(&registry.handles).push(ConsumerHandle {
                source: consumer.source,
                receiver,
                stop,
                tasks,
            });
        }

        Ok(registry)
    }

    /// Number of running consumers.
    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.handles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sources of the running consumers.
    pub fn sources(&self) -> Vec<ReceiverSource> {
        lock_ignore_poison(&self.handles)
            .iter()
            .map(|h| h.source.clone())
            .collect()
    }

    /// Stop every consumer.
    ///
    /// Consumers are stopped concurrently and independently. A consumer whose
    /// handlers do not finish within the stop grace period is aborted. Close
    /// failures are logged and returned, never raised. A second call finds
    /// nothing to stop.
    pub async fn stop_all(&self) -> Vec<BusError> {
        // ---
        let handles: Vec<ConsumerHandle> = std::mem::take(&mut *lock_ignore_poison(&self.handles));
        if handles.is_empty() {
            return Vec::new();
        }

        crate::log_info!("{}: stopping {} consumer(s)", self.bus_name, handles.len());

        let stops = handles
            .into_iter()
            .map(|handle| stop_handle(self.bus_name.clone(), handle, self.stop_grace));

        join_all(stops).await.into_iter().flatten().collect()
    }
}

impl Drop for ConsumerRegistry {
    fn drop(&mut self) {
        // Loops of a registry dropped without stop_all end at their next receive.
        for handle in lock_ignore_poison(&self.handles).iter() {
            handle.stop.cancel();
        }
    }
}

async fn stop_handle(bus_name: Arc<str>, handle: ConsumerHandle, grace: Duration) -> Vec<BusError> {
    // ---
    let ConsumerHandle {
        source,
        receiver,
        stop,
        mut tasks,
    } = handle;

    let mut failures = Vec::new();
    stop.cancel();

    let joined = tokio::time::timeout(grace, join_all(tasks.iter_mut())).await;
    match joined {
        Ok(joined) => {
            for outcome in joined {
                if let Err(err) = outcome {
                    crate::log_warn!("{bus_name}: consumer task on {source} ended abnormally: {err}");
                }
            }
        }
        Err(_) => {
            crate::log_warn!("{bus_name}: consumer on {source} did not stop within {grace:?}; aborting");
            tasks.iter().for_each(JoinHandle::abort);
            failures.push(BusError::Shutdown {
                resource: format!("consumer on {source}"),
                reason: format!("handlers still running after {grace:?}"),
            });
        }
    }

    if let Err(err) = receiver.close().await {
        crate::log_error!("{bus_name}: error closing consumer on {source}: {err}");
        failures.push(BusError::Shutdown {
            resource: format!("consumer on {source}"),
            reason: err.to_string(),
        });
    }

    failures
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::consumer::{wrap_event_handler, ReplySink};
    use crate::config::ConsumerBuilder;
    use crate::{
        Address, Endpoint, Envelope, JsonSerializer, Message, MessageType, MemoryTransport, PathKind,
        TransportFactory,
    };
    use bytes::Bytes;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Serialize, Deserialize)]
    struct Tick;

    impl Message for Tick {
        const MESSAGE_TYPE: MessageType = MessageType::new("Tick");
    }

    struct NoReplies;

    #[async_trait::async_trait]
    impl ReplySink for NoReplies {
        async fn reply(&self, _to: &Endpoint, _env: Envelope) -> Result<()> {
            Ok(())
        }
    }

    fn context() -> Arc<DispatchContext> {
        Arc::new(DispatchContext {
            bus_name: Arc::from("test"),
            serializer: Arc::new(JsonSerializer),
            replies: Arc::new(NoReplies),
        })
    }

    fn tick(path: &str) -> Envelope {
        Envelope::message(Address::from(path), Arc::from("Tick"), Bytes::from_static(b"null"))
    }

    #[tokio::test]
    async fn stop_all_is_idempotent() {
        // ---
        let factory: TransportFactoryPtr = Arc::new(MemoryTransport::new());
        let handled = Arc::new(AtomicUsize::new(0));
        let counter = handled.clone();

        let settings = ConsumerBuilder::default()
            .queue("ticks")
            .instances(2)
            .build(
                Tick::MESSAGE_TYPE,
                wrap_event_handler(move |_: Tick| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                }),
            )
            .unwrap();

        let registry = ConsumerRegistry::start(vec![settings], &factory, context(), DEFAULT_STOP_GRACE)
            .await
            .unwrap();
        assert_eq!(registry.len(), 1);

        let producer = factory.create_producer("ticks", PathKind::Queue).await.unwrap();
        producer.send(tick("ticks")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while handled.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(registry.stop_all().await.is_empty());
        assert!(registry.is_empty());
        assert!(registry.stop_all().await.is_empty());
    }

    #[tokio::test]
    async fn hung_handler_is_aborted_after_grace() {
        // ---
        let factory: TransportFactoryPtr = Arc::new(MemoryTransport::new());
        let settings = ConsumerBuilder::default()
            .queue("stuck")
            .build(
                Tick::MESSAGE_TYPE,
                wrap_event_handler(|_: Tick| async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }),
            )
            .unwrap();
        let idle = ConsumerBuilder::default()
            .topic("idle")
            .subscription("s")
            .build(Tick::MESSAGE_TYPE, wrap_event_handler(|_: Tick| async { Ok(()) }))
            .unwrap();

        let registry = ConsumerRegistry::start(
            vec![settings, idle],
            &factory,
            context(),
            Duration::from_millis(50),
        )
        .await
        .unwrap();

        let producer = factory.create_producer("stuck", PathKind::Queue).await.unwrap();
        producer.send(tick("stuck")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let failures = registry.stop_all().await;
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], BusError::Shutdown { resource, .. } if resource.contains("stuck")));
        assert!(registry.is_empty());
    }
}
