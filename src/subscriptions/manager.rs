//! Change emitter broadcasting batches to subscribers.

use crate::types::ChangeBatch;
use crossbeam_channel::{bounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

use super::types::{
    DropReason, ObserverEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};

/// Internal subscription state.
struct Subscriber<T> {
    sender: Sender<ObserverEvent<T>>,
}

impl<T> Subscriber<T> {
    /// Try to send an event. Returns false if buffer is full (subscriber will be dropped).
    fn try_send(&self, event: ObserverEvent<T>) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Fans change batches out to every subscriber of one observer.
pub struct ChangeEmitter<T> {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscriber<T>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Most recently emitted batch.
    last: RwLock<Option<ChangeBatch<T>>>,
    /// Set once by `close`; later subscribers are dropped on arrival.
    closed: Mutex<Option<DropReason>>,
}

impl<T: Clone> ChangeEmitter<T> {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            last: RwLock::new(None),
            closed: Mutex::new(None),
        }
    }

    /// Create a new subscription.
    ///
    /// With `replay_last`, the most recent batch (if any) is queued first.
    /// After `close`, the handle only receives the closing `Dropped` event.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle<T> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        let subscriber = Subscriber { sender };

        let mut subs = self.subscriptions.write();
        if let Some(reason) = *self.closed.lock() {
            let _ = subscriber.try_send(ObserverEvent::Dropped { reason });
            trace!(?id, "subscriber refused, emitter closed");
            return SubscriptionHandle { id, receiver };
        }

        if config.replay_last {
            if let Some(batch) = self.last.read().clone() {
                // A fresh channel with capacity >= 1 always accepts this.
                subscriber.try_send(ObserverEvent::Changes { batch });
            }
        }

        subs.insert(id, subscriber);
        trace!(?id, "subscriber added");

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Send dropped event (best effort)
            let _ = sub.try_send(ObserverEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Drop every subscriber, telling each one why.
    pub fn close(&self, reason: DropReason) {
        let drained: Vec<Subscriber<T>> = {
            let mut subs = self.subscriptions.write();
            *self.closed.lock() = Some(reason);
            subs.drain().map(|(_, sub)| sub).collect()
        };
        debug!(count = drained.len(), ?reason, "closing subscribers");
        for sub in drained {
            let _ = sub.try_send(ObserverEvent::Dropped { reason });
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.lock().is_some()
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// The most recently emitted batch.
    pub fn last_batch(&self) -> Option<ChangeBatch<T>> {
        self.last.read().clone()
    }

    /// Deliver a batch to all subscribers. Drops subscribers that fail to receive.
    pub fn emit(&self, batch: ChangeBatch<T>) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if !sub.try_send(ObserverEvent::Changes {
                    batch: batch.clone(),
                }) {
                    to_remove.push(*id);
                }
            }
        }

        *self.last.write() = Some(batch);

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    debug!(?id, "dropping slow subscriber");
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.try_send(ObserverEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl<T: Clone> Default for ChangeEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Change;
    use std::time::Duration;

    fn batch_of(items: &[&'static str]) -> ChangeBatch<&'static str> {
        ChangeBatch::new(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| Change::Add { index, item: *item })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let emitter = ChangeEmitter::<&'static str>::new();

        let handle = emitter.subscribe(SubscriptionConfig::default());
        assert_eq!(emitter.subscription_count(), 1);

        emitter.unsubscribe(handle.id);
        assert_eq!(emitter.subscription_count(), 0);

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(
            event,
            ObserverEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        ));
    }

    #[test]
    fn test_emit_fans_out_to_all() {
        let emitter = ChangeEmitter::new();
        let first = emitter.subscribe(SubscriptionConfig::default());
        let second = emitter.subscribe(SubscriptionConfig::default());

        emitter.emit(batch_of(&["a", "b"]));

        for handle in [&first, &second] {
            let batches = handle.try_batches();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].len(), 2);
        }
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let emitter = ChangeEmitter::new();
        let config = SubscriptionConfig {
            buffer_size: 2,
            ..Default::default()
        };
        let slow = emitter.subscribe(config);
        let fast = emitter.subscribe(SubscriptionConfig::default());

        for _ in 0..5 {
            emitter.emit(batch_of(&["x"]));
        }

        assert_eq!(emitter.subscription_count(), 1);
        assert_eq!(fast.try_batches().len(), 5);
        assert_eq!(slow.try_batches().len(), 2);
    }

    #[test]
    fn test_replay_last_for_late_subscriber() {
        let emitter = ChangeEmitter::new();
        emitter.emit(batch_of(&["a"]));
        emitter.emit(batch_of(&["a", "b"]));

        let late = emitter.subscribe(SubscriptionConfig::replaying());
        let plain = emitter.subscribe(SubscriptionConfig::default());

        let replayed = late.try_batches();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].len(), 2);
        assert!(plain.try_batches().is_empty());
        assert_eq!(emitter.last_batch().map(|b| b.len()), Some(2));
    }

    #[test]
    fn test_close_notifies_everyone() {
        let emitter = ChangeEmitter::<u32>::new();
        let a = emitter.subscribe(SubscriptionConfig::default());
        let b = emitter.subscribe(SubscriptionConfig::default());

        emitter.close(DropReason::Destroyed);
        assert_eq!(emitter.subscription_count(), 0);

        for handle in [&a, &b] {
            let event = handle.try_recv().unwrap();
            assert!(matches!(
                event,
                ObserverEvent::Dropped {
                    reason: DropReason::Destroyed
                }
            ));
        }
    }

    #[test]
    fn test_subscribe_after_close_is_dropped() {
        let emitter = ChangeEmitter::<u32>::new();
        emitter.close(DropReason::Destroyed);
        assert!(emitter.is_closed());

        let late = emitter.subscribe(SubscriptionConfig::replaying());
        assert_eq!(emitter.subscription_count(), 0);
        assert!(matches!(
            late.try_recv().unwrap(),
            ObserverEvent::Dropped {
                reason: DropReason::Destroyed
            }
        ));
        assert!(late.try_recv().is_err());
    }
}
