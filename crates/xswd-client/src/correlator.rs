//! Request/response correlation by id.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use xswd_core::RpcResponse;

use crate::error::{ConnectionError, Result};
use crate::lock;

enum Slot {
    InFlight,
    Resolved(RpcResponse),
}

/// Pending requests keyed by id.
///
/// Ids start at 1 and are never reused for the lifetime of the connection,
/// including across re-initialization.
pub(crate) struct Correlator {
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, Slot>>,
    ready: Notify,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
            ready: Notify::new(),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Mark a request as sent and awaiting its reply.
    pub(crate) fn register(&self, id: u64) {
        lock(&self.slots).insert(id, Slot::InFlight);
    }

    /// Store a reply. Returns false if nothing is waiting on this id.
    pub(crate) fn resolve(&self, id: u64, response: RpcResponse) -> bool {
        let mut slots = lock(&self.slots);
        let Some(slot) = slots.get_mut(&id) else {
            return false;
        };
        *slot = Slot::Resolved(response);
        drop(slots);
        self.ready.notify_waiters();
        true
    }

    fn take(&self, id: u64) -> Option<RpcResponse> {
        let mut slots = lock(&self.slots);
        match slots.remove(&id) {
            Some(Slot::Resolved(response)) => Some(response),
            Some(Slot::InFlight) => {
                slots.insert(id, Slot::InFlight);
                None
            }
            None => None,
        }
    }

    pub(crate) fn forget(&self, id: u64) {
        lock(&self.slots).remove(&id);
    }

    /// Number of requests sent but not yet consumed.
    pub(crate) fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Wait for the reply to `id`, consuming it.
    ///
    /// On timeout the slot is evicted; a reply arriving afterwards is
    /// dropped.
    pub(crate) async fn wait(&self, id: u64, limit: Duration) -> Result<RpcResponse> {
        let waited = tokio::time::timeout(limit, async {
            loop {
                let mut notified = pin!(self.ready.notified());
                notified.as_mut().enable();
                if let Some(response) = self.take(id) {
                    return response;
                }
                tracing::trace!(id, "waiting for response");
                notified.await;
            }
        })
        .await;

        match waited {
            Ok(response) => Ok(response),
            Err(_) => {
                self.forget(id);
                Err(ConnectionError::RequestTimeout { id })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn reply(id: u64, result: serde_json::Value) -> RpcResponse {
        RpcResponse {
            id: json!(id),
            result: Some(result),
            error: None,
        }
    }

    #[test]
    fn ids_are_monotonic() {
        let correlator = Correlator::new();
        assert_eq!(correlator.next_id(), 1);
        assert_eq!(correlator.next_id(), 2);
        assert_eq!(correlator.next_id(), 3);
    }

    #[test]
    fn unknown_id_is_not_resolved() {
        let correlator = Correlator::new();
        assert!(!correlator.resolve(9, reply(9, json!(true))));
        assert_eq!(correlator.len(), 0);
    }

    #[tokio::test]
    async fn resolved_before_wait() {
        let correlator = Correlator::new();
        correlator.register(1);
        assert!(correlator.resolve(1, reply(1, json!("pong"))));

        let response = correlator.wait(1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(response.result, Some(json!("pong")));
        assert_eq!(correlator.len(), 0);
    }

    #[tokio::test]
    async fn resolved_while_waiting() {
        let correlator = Arc::new(Correlator::new());
        correlator.register(1);
        correlator.register(2);

        let waiter = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.wait(2, Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;

        correlator.resolve(1, reply(1, json!("first")));
        correlator.resolve(2, reply(2, json!("second")));

        let response = waiter.await.unwrap().unwrap();
        assert_eq!(response.result, Some(json!("second")));
        assert_eq!(correlator.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_evicts_slot() {
        let correlator = Correlator::new();
        correlator.register(5);

        let err = correlator.wait(5, Duration::from_secs(20)).await.unwrap_err();
        assert!(matches!(err, ConnectionError::RequestTimeout { id: 5 }));
        assert_eq!(correlator.len(), 0);
        assert!(!correlator.resolve(5, reply(5, json!(null))));
    }
}
