// src/client_cache.rs

//! Lazily-populated, per-path producer cache.
//!
//! Each [`TransportBus`](crate::TransportBus) owns one cache for queue clients
//! and one for topic clients. The first caller for a path constructs the
//! client through the creation function supplied by the transport; concurrent
//! callers for the same path wait for that single construction and share its
//! result. Callers for different paths never wait on each other beyond a short
//! map lookup.

use crate::pending::lock_ignore_poison;
use crate::{Address, BusError, ProducerPtr, Result};
use futures::future::{join_all, BoxFuture};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Creation function: path → new producer client.
pub type CreateClientFn = Arc<dyn Fn(Address) -> BoxFuture<'static, Result<ProducerPtr>> + Send + Sync>;

type Slot = Arc<OnceCell<ProducerPtr>>;

/// Concurrency-safe map from path to shared producer client.
pub struct ClientCache {
    // ---
    label: &'static str,
    create: CreateClientFn,
    slots: Mutex<HashMap<Address, Slot>>,
}

impl ClientCache {
    /// Create an empty cache. `label` names the client kind in logs.
    pub fn new(label: &'static str, create: CreateClientFn) -> Self {
        Self {
            label,
            create,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the client for `path`, creating it on first use.
    ///
    /// At most one client is constructed per path. If construction fails the
    /// error is returned to every caller that was waiting on it and nothing is
    /// cached, so a later call tries again.
    pub async fn get_or_create(&self, path: &Address) -> Result<ProducerPtr> {
        // ---
        let slot = {
            let mut slots = lock_ignore_poison(&self.slots);
            slots.entry(path.clone()).or_default().clone()
        };

        let created = slot
            .get_or_try_init(|| {
                crate::log_debug!("creating {} client for path {path}", self.label);
                (self.create)(path.clone())
            })
            .await;

        match created {
            Ok(client) => Ok(client.clone()),
            Err(err) => {
                self.forget_empty(path, &slot);
                Err(err)
            }
        }
    }

    /// Drop the slot for `path` if it is still `slot`, holds no client and no
    /// other caller is waiting on it.
    fn forget_empty(&self, path: &Address, slot: &Slot) {
        // ---
        // Clones are only taken under this lock, so two references means the
        // map and this caller.
        let mut slots = lock_ignore_poison(&self.slots);
        let stale = slots.get(path).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && !current.initialized() && Arc::strong_count(current) == 2
        });
        if stale {
            slots.remove(path);
        }
    }

    /// Number of paths tracked, including those whose client is still being
    /// created.
    #[cfg(test)]
    fn slot_count(&self) -> usize {
        lock_ignore_poison(&self.slots).len()
    }

    /// Number of paths with a constructed client.
    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.slots)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every cached client.
    ///
    /// All closes run even if some fail; the failures are returned. The cache
    /// is empty afterwards.
    pub async fn close_all(&self) -> Vec<BusError> {
        // ---
        let drained: Vec<(Address, Slot)> = lock_ignore_poison(&self.slots).drain().collect();

        let closes = drained.into_iter().filter_map(|(path, slot)| {
            let client = slot.get()?.clone();
            let label = self.label;
            Some(async move {
                crate::log_debug!("closing {label} client for path {path}");
                client.close().await.map_err(|e| BusError::Shutdown {
                    resource: format!("{label} client {path}"),
                    reason: e.to_string(),
                })
            })
        });

        join_all(closes)
            .await
            .into_iter()
            .filter_map(|outcome| outcome.err())
            .collect()
    }
}
