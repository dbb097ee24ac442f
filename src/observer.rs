//! The collection observer and its lifecycle.
//!
//! An observer is created inert, bound to a source. The first subscription
//! engages the source exactly once: a pushing source is observed live and
//! its stop handle kept, an enumerable-only source is read once and emitted
//! as a single batch of additions. `destroy` is terminal once the source has
//! been engaged, and a no-op before that.

use crate::batcher::{Batcher, DebouncePolicy};
use crate::error::{ObserverError, Result};
use crate::recorder::{ChangeRecorder, ObserveCallbacks};
use crate::scheduler::HostScheduler;
use crate::source::{ObserverHandle, PushSource, Source, SourceKind};
use crate::subscriptions::{
    ChangeEmitter, DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};
use crate::types::{ChangeBatch, ObserverConfig, ObserverState};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

enum Lifecycle<T> {
    Inert(SourceKind<T>),
    Starting,
    Live {
        handle: ObserverHandle,
        _source: Box<dyn PushSource<T>>,
    },
    BulkDone,
    Stopped,
}

impl<T> Lifecycle<T> {
    fn state(&self) -> ObserverState {
        match self {
            Lifecycle::Inert(_) => ObserverState::Inert,
            Lifecycle::Starting => ObserverState::Starting,
            Lifecycle::Live { .. } => ObserverState::LiveObserving,
            Lifecycle::BulkDone => ObserverState::BulkDone,
            Lifecycle::Stopped => ObserverState::Stopped,
        }
    }
}

/// Mirrors an ordered collection into a stream of [`ChangeBatch`] values.
///
/// All subscribers share one underlying observation and one batch stream.
///
/// # Example
///
/// ```ignore
/// let scheduler = Arc::new(VirtualScheduler::new());
/// let observer = CollectionObserver::new(
///     Source::push(cursor),
///     scheduler.clone(),
///     ObserverConfig::default().with_debounce_ms(0),
/// )?;
///
/// let handle = observer.subscribe()?;
/// scheduler.run_until_idle();
///
/// for batch in handle.try_batches() {
///     batch.apply_to(&mut mirror);
/// }
/// observer.destroy();
/// ```
pub struct CollectionObserver<T: Clone + Send + Sync + 'static> {
    config: ObserverConfig,
    lifecycle: Mutex<Lifecycle<T>>,
    batcher: Arc<Batcher<T>>,
    emitter: Arc<ChangeEmitter<T>>,
}

impl<T: Clone + Send + Sync + 'static> CollectionObserver<T> {
    /// Bind an observer to `source` without engaging it.
    ///
    /// Fails with [`ObserverError::InvalidSource`] if the source offers
    /// neither capability, or lacks the one `config.engage` requires.
    pub fn new(
        source: Source<T>,
        scheduler: Arc<dyn HostScheduler>,
        config: ObserverConfig,
    ) -> Result<Self> {
        let source = source.resolve(config.engage)?;
        let emitter = Arc::new(ChangeEmitter::new());
        let batcher = Batcher::new(
            DebouncePolicy::from_config(&config),
            scheduler,
            emitter.clone(),
        );

        Ok(Self {
            config,
            lifecycle: Mutex::new(Lifecycle::Inert(source)),
            batcher,
            emitter,
        })
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn state(&self) -> ObserverState {
        self.lifecycle.lock().state()
    }

    /// True while a live observation is running.
    pub fn is_active(&self) -> bool {
        self.state() == ObserverState::LiveObserving
    }

    /// Subscribe with the default subscription settings.
    pub fn subscribe(&self) -> Result<SubscriptionHandle<T>> {
        self.subscribe_with(SubscriptionConfig::default())
    }

    /// Attach a subscriber. The first call engages the source.
    ///
    /// The subscriber is registered before engagement, so it receives the
    /// batch a one-shot enumeration emits synchronously. Registration
    /// happens under the lifecycle lock, so a concurrent `destroy` either
    /// rejects the call or drops the new subscriber with the others.
    pub fn subscribe_with(&self, config: SubscriptionConfig) -> Result<SubscriptionHandle<T>> {
        let (handle, source) = {
            let mut lifecycle = self.lifecycle.lock();
            if matches!(*lifecycle, Lifecycle::Stopped) {
                return Err(ObserverError::Destroyed);
            }
            let handle = self.emitter.subscribe(config);
            let source = if matches!(*lifecycle, Lifecycle::Inert(_)) {
                match std::mem::replace(&mut *lifecycle, Lifecycle::Starting) {
                    Lifecycle::Inert(source) => Some(source),
                    _ => None,
                }
            } else {
                None
            };
            (handle, source)
        };

        if let Some(source) = source {
            self.engage(source);
        }
        Ok(handle)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.emitter.unsubscribe(id);
    }

    pub fn subscription_count(&self) -> usize {
        self.emitter.subscription_count()
    }

    /// The most recently emitted batch.
    pub fn last_changes(&self) -> Option<ChangeBatch<T>> {
        self.emitter.last_batch()
    }

    /// Changes recorded but not yet flushed.
    pub fn pending_changes(&self) -> usize {
        self.batcher.pending_len()
    }

    /// Stop observing. Idempotent.
    ///
    /// Before the first subscription this does nothing and the observer can
    /// still be engaged later. Afterwards it stops the live observation,
    /// cancels any pending flush, and drops every subscriber; no batch is
    /// emitted from then on.
    pub fn destroy(&self) {
        let previous = {
            let mut lifecycle = self.lifecycle.lock();
            if matches!(*lifecycle, Lifecycle::Inert(_) | Lifecycle::Stopped) {
                return;
            }
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        };

        self.batcher.stop();
        self.emitter.close(DropReason::Destroyed);
        if let Lifecycle::Live { handle, .. } = previous {
            handle.stop();
        }
        debug!("observer destroyed");
    }

    fn engage(&self, source: SourceKind<T>) {
        match source {
            SourceKind::Pull(mut pull) => {
                debug!("enumerating source once");
                let changes = pull
                    .fetch_all()
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| ChangeRecorder::added(item, index))
                    .collect();
                self.batcher.emit_now(changes);

                let mut lifecycle = self.lifecycle.lock();
                if matches!(*lifecycle, Lifecycle::Starting) {
                    *lifecycle = Lifecycle::BulkDone;
                }
            }
            SourceKind::Push(mut push) => {
                debug!("starting live observation");
                let stop = push.observe(ObserveCallbacks::new(self.batcher.clone()));
                let handle = ObserverHandle::new(stop);

                let mut lifecycle = self.lifecycle.lock();
                if matches!(*lifecycle, Lifecycle::Starting) {
                    *lifecycle = Lifecycle::Live {
                        handle,
                        _source: push,
                    };
                } else {
                    // Destroyed while the source was starting up.
                    drop(lifecycle);
                    handle.stop();
                }
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for CollectionObserver<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}
