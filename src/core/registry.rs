use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A non-negative message is the new value of `completed`; a negative
/// message (`-1`) means the encoder failed to start and the subscriber
/// should terminate.
pub type Notification = i64;

pub const START_FAILURE: Notification = -1;

/// Per-buffer mapping from subscriber id to notification sink.
///
/// Sinks are bounded capacity-1 channels. Sends use `try_send`: a send that
/// would block is dropped rather than blocking the producer, because the
/// consumer always re-reads `completed` on its next notification and copies
/// forward from its own `sent` high-water mark (see
/// [`crate::core::session::Subscriber`]).
#[derive(Default)]
pub struct SubscriberRegistry {
    sinks: RwLock<HashMap<Uuid, mpsc::Sender<Notification>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: Uuid, sink: mpsc::Sender<Notification>) {
        self.sinks.write().insert(id, sink);
    }

    pub fn remove(&self, id: &Uuid) {
        self.sinks.write().remove(id);
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the current sinks for a broadcast. Taken under the write
    /// lock like `add`/`remove` so a concurrent subscribe/unsubscribe can
    /// never observe a torn registry, but the snapshot itself is handed
    /// back by value so the caller can send without holding any lock.
    pub fn snapshot(&self) -> Vec<mpsc::Sender<Notification>> {
        self.sinks.read().values().cloned().collect()
    }

    /// Atomically take every sink out of the registry, leaving it empty.
    /// Used when a job reaches a terminal state and must deliver exactly
    /// one final message to each subscriber.
    pub fn drain(&self) -> Vec<mpsc::Sender<Notification>> {
        let mut sinks = self.sinks.write();
        sinks.drain().map(|(_, sink)| sink).collect()
    }

    /// Best-effort broadcast: a full sink is skipped, not blocked on.
    pub fn broadcast(sinks: &[mpsc::Sender<Notification>], value: Notification) {
        for sink in sinks {
            let _ = sink.try_send(value);
        }
    }

    /// Deliver a terminal message to every sink, waiting for room instead of
    /// dropping it. Each subscriber receives exactly one terminal message
    /// (§4.2), so unlike `broadcast` this can never silently discard it —
    /// a stale count already sitting in a capacity-1 sink would otherwise
    /// make the final value disappear. Mirrors the original's unbuffered,
    /// blocking `ch <- count` send.
    pub async fn broadcast_terminal(sinks: &[mpsc::Sender<Notification>], value: Notification) {
        for sink in sinks {
            let _ = sink.send(value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_remove_and_snapshot() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = Uuid::new_v4();

        registry.add(id, tx);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot().len(), 1);

        registry.remove(&id);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn drain_empties_registry_and_returns_all_sinks() {
        let registry = SubscriberRegistry::new();
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);

        registry.add(Uuid::new_v4(), tx1);
        registry.add(Uuid::new_v4(), tx2);

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn broadcast_drops_full_sink_without_blocking() {
        let registry = SubscriberRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = Uuid::new_v4();
        registry.add(id, tx);

        // Fill the capacity-1 channel.
        SubscriberRegistry::broadcast(&registry.snapshot(), 1);
        // Second broadcast should be silently dropped, not block.
        SubscriberRegistry::broadcast(&registry.snapshot(), 2);

        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test]
    async fn broadcast_terminal_waits_instead_of_dropping() {
        let registry = SubscriberRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = Uuid::new_v4();
        registry.add(id, tx);

        // Fill the capacity-1 channel with a stale count, as a lagging
        // adaptor would leave behind.
        SubscriberRegistry::broadcast(&registry.snapshot(), 1);

        let sinks = registry.drain();
        let send = tokio::spawn(async move {
            SubscriberRegistry::broadcast_terminal(&sinks, 5).await;
        });

        // The stale value must be read out before the terminal send can
        // land; draining it here proves the terminal send actually waited
        // rather than dropping itself.
        assert_eq!(rx.recv().await, Some(1));
        send.await.unwrap();
        assert_eq!(rx.recv().await, Some(5));
    }
}
