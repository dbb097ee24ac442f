//! Subscription types for change batch delivery.

use crate::types::ChangeBatch;
use serde::Serialize;

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Deliver the most recently emitted batch on subscribe.
    /// Default: false
    pub replay_last: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            replay_last: false,
        }
    }
}

impl SubscriptionConfig {
    /// Late subscriber that wants the last batch first.
    pub fn replaying() -> Self {
        Self {
            replay_last: true,
            ..Default::default()
        }
    }
}

/// Events delivered to subscribers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverEvent<T> {
    /// A flushed batch of changes.
    Changes { batch: ChangeBatch<T> },

    /// Subscription was dropped. Nothing follows.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The observer was destroyed.
    Destroyed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to receive a subscription's events.
pub struct SubscriptionHandle<T> {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<ObserverEvent<T>>,
}

impl<T> SubscriptionHandle<T> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ObserverEvent<T>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ObserverEvent<T>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ObserverEvent<T>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every batch currently queued, skipping lifecycle events.
    pub fn try_batches(&self) -> Vec<ChangeBatch<T>> {
        self.receiver
            .try_iter()
            .filter_map(|event| match event {
                ObserverEvent::Changes { batch } => Some(batch),
                ObserverEvent::Dropped { .. } => None,
            })
            .collect()
    }
}
