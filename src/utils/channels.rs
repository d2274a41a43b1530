//! Typed event fan-out over crossbeam channels
//!
//! Producers own a `Broadcaster` and call `emit` on every state change.
//! Consumers register with `subscribe` and either call `unsubscribe` or
//! simply drop their receiver; disconnected subscribers are pruned on the
//! next emit.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A registered interest in events of type `E`
pub struct Subscription<E> {
    id: SubscriptionId,
    rx: Receiver<E>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next event without blocking
    pub fn try_recv(&self) -> Option<E> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every event currently queued
    pub fn drain(&self) -> Vec<E> {
        self.rx.try_iter().collect()
    }

    pub fn receiver(&self) -> &Receiver<E> {
        &self.rx
    }
}

pub struct Broadcaster<E> {
    subscribers: Arc<Mutex<Vec<(SubscriptionId, Sender<E>)>>>,
    next_id: Arc<AtomicU64>,
}

impl<E> Clone for Broadcaster<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<E: Clone> Broadcaster<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> Subscription<E> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = unbounded();
        self.subscribers.lock().push((id, tx));
        Subscription { id, rx }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|(sub_id, _)| *sub_id != id);
    }

    pub fn emit(&self, event: E) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(id, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                trace!("Dropping disconnected subscriber {:?}", id);
            }
            alive
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Clone> Default for Broadcaster<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let hub = Broadcaster::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.emit(1u32);
        hub.emit(2u32);

        assert_eq!(a.drain(), vec![1, 2]);
        assert_eq!(b.drain(), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = Broadcaster::new();
        let a = hub.subscribe();
        hub.unsubscribe(a.id());

        hub.emit("ignored");
        assert!(a.try_recv().is_none());
        assert_eq!(hub.subscriber_count(), 0);

        // Unknown ids are fine
        hub.unsubscribe(a.id());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let hub = Broadcaster::new();
        let a = hub.subscribe();
        let _b = hub.subscribe();
        drop(a);

        hub.emit(7u8);
        assert_eq!(hub.subscriber_count(), 1);
    }
}
