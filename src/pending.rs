// src/pending.rs

use crate::{BusError, CorrelationId, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Acquire mutex guard, ignoring poisoning
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Requests sent by this bus that are still waiting for a response.
///
/// Maps correlation IDs to oneshot channels. The response consumer completes
/// entries; the sender removes its own entry on timeout or cancellation.
pub(crate) struct PendingRequests {
    // ---
    requests: Mutex<HashMap<CorrelationId, oneshot::Sender<Result<Bytes>>>>,
}

impl PendingRequests {
    // ---
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending request and return the receiver for its outcome.
    pub fn register(&self, correlation_id: CorrelationId) -> oneshot::Receiver<Result<Bytes>> {
        // ---
        let (tx, rx) = oneshot::channel();
        lock_ignore_poison(&self.requests).insert(correlation_id, tx);
        rx
    }

    /// Complete a pending request.
    ///
    /// Returns false when no request with this ID is pending (already timed
    /// out, cancelled, or never sent by this bus).
    pub fn complete(&self, correlation_id: &CorrelationId, outcome: Result<Bytes>) -> bool {
        // ---
        let tx = lock_ignore_poison(&self.requests).remove(correlation_id);
        match tx {
            Some(tx) => {
                // Receiver may already be gone if the caller gave up.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drop a pending request without completing it.
    pub fn remove(&self, correlation_id: &CorrelationId) -> bool {
        lock_ignore_poison(&self.requests)
            .remove(correlation_id)
            .is_some()
    }

    /// Fail every pending request with `ShuttingDown`. Returns how many were failed.
    pub fn fail_all(&self, bus_name: &str) -> usize {
        // ---
        let drained: Vec<_> = lock_ignore_poison(&self.requests).drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(BusError::ShuttingDown(bus_name.to_string())));
        }
        count
    }

    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.requests).len()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn register_and_complete() {
        // ---
        let pending = PendingRequests::new();
        let id = CorrelationId::generate();

        let rx = pending.register(id.clone());
        assert_eq!(pending.len(), 1);

        assert!(pending.complete(&id, Ok(Bytes::from("pong"))));
        assert_eq!(pending.len(), 0);

        let received = rx.blocking_recv().unwrap().unwrap();
        assert_eq!(received, Bytes::from("pong"));
    }

    #[test]
    fn complete_unknown_id_is_ignored() {
        // ---
        let pending = PendingRequests::new();
        assert!(!pending.complete(&CorrelationId::generate(), Ok(Bytes::new())));
    }

    #[test]
    fn remove_is_single_shot() {
        // ---
        let pending = PendingRequests::new();
        let id = CorrelationId::generate();
        let _rx = pending.register(id.clone());

        assert!(pending.remove(&id));
        assert!(!pending.remove(&id));
    }

    #[test]
    fn fail_all_reports_shutdown() {
        // ---
        let pending = PendingRequests::new();
        let rx1 = pending.register(CorrelationId::generate());
        let rx2 = pending.register(CorrelationId::generate());

        assert_eq!(pending.fail_all("primary"), 2);
        assert_eq!(pending.len(), 0);

        for rx in [rx1, rx2] {
            match rx.blocking_recv().unwrap() {
                Err(BusError::ShuttingDown(name)) => assert_eq!(name, "primary"),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }
}
