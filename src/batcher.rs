//! Change batching and debounced emission.
//!
//! Raw changes are buffered and flushed as one [`ChangeBatch`] through a
//! host task named `"emit"`, so the host sees outstanding work for as long
//! as a flush is pending. Two policies exist:
//!
//! - **Trailing**: every change restarts a timer; the buffer is flushed once
//!   the timer expires without interruption.
//! - **Priming-aware** (`debounce_ms == 0`): while priming, a zero-delay
//!   trailing debounce folds the synchronous burst a live source fires on
//!   first observation into one batch. After the first flush the batcher is
//!   steady and every change is flushed on its own, immediately.

use crate::scheduler::{HostScheduler, HostTask, TaskId};
use crate::subscriptions::ChangeEmitter;
use crate::types::{Change, ChangeBatch, ObserverConfig};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Name of the host task that performs a flush.
const EMIT_TASK: &str = "emit";

/// Flush timing policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebouncePolicy {
    Trailing(Duration),
    PrimingAware,
}

impl DebouncePolicy {
    pub fn from_config(config: &ObserverConfig) -> Self {
        if config.debounce_ms == 0 {
            DebouncePolicy::PrimingAware
        } else {
            DebouncePolicy::Trailing(config.debounce())
        }
    }
}

/// Sub-state of the priming-aware policy. One-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Priming,
    Steady,
}

struct BatcherState<T> {
    pending: Vec<Change<T>>,
    flush_task: Option<TaskId>,
    phase: Phase,
    stopped: bool,
}

pub struct Batcher<T> {
    policy: DebouncePolicy,
    scheduler: Arc<dyn HostScheduler>,
    emitter: Arc<ChangeEmitter<T>>,
    state: Mutex<BatcherState<T>>,
    this: Weak<Batcher<T>>,
}

impl<T: Clone + Send + Sync + 'static> Batcher<T> {
    pub fn new(
        policy: DebouncePolicy,
        scheduler: Arc<dyn HostScheduler>,
        emitter: Arc<ChangeEmitter<T>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            policy,
            scheduler,
            emitter,
            state: Mutex::new(BatcherState {
                pending: Vec::new(),
                flush_task: None,
                phase: Phase::Priming,
                stopped: false,
            }),
            this: this.clone(),
        })
    }

    pub fn policy(&self) -> DebouncePolicy {
        self.policy
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Buffer a change and apply the debounce policy.
    pub fn push(&self, change: Change<T>) {
        let (delay, previous) = {
            let mut state = self.state.lock();
            if state.stopped {
                trace!(kind = ?change.kind(), "change after stop ignored");
                return;
            }
            trace!(kind = ?change.kind(), index = change.index(), "change recorded");
            state.pending.push(change);

            let delay = match (self.policy, state.phase) {
                (DebouncePolicy::Trailing(delay), _) => Some(delay),
                (DebouncePolicy::PrimingAware, Phase::Priming) => Some(Duration::ZERO),
                (DebouncePolicy::PrimingAware, Phase::Steady) => None,
            };
            let previous = match delay {
                Some(_) => state.flush_task.take(),
                None => None,
            };
            (delay, previous)
        };

        match delay {
            Some(delay) => self.reschedule(previous, delay),
            None => {
                let id = self.scheduler.schedule_task(self.emit_task());
                self.scheduler.run_task(id);
            }
        }
    }

    /// Publish a batch that bypasses the debounce, e.g. a one-shot enumeration.
    pub fn emit_now(&self, changes: Vec<Change<T>>) {
        let state = self.state.lock();
        if state.stopped {
            return;
        }
        match ChangeBatch::new(changes) {
            Some(batch) => {
                debug!(len = batch.len(), "emitting batch");
                self.emitter.emit(batch);
            }
            None => trace!("empty batch skipped"),
        }
    }

    /// Flush buffered changes now.
    ///
    /// The buffer is swapped out and emitted under the state lock, so a
    /// concurrent `stop` either precedes the emission or sees it finished.
    /// Changes that arrive meanwhile start a fresh batch.
    pub fn flush(&self) {
        let emitted = {
            let mut state = self.state.lock();
            state.flush_task = None;
            if state.stopped {
                return;
            }
            match ChangeBatch::new(std::mem::take(&mut state.pending)) {
                Some(batch) => {
                    debug!(len = batch.len(), "flushing batch");
                    self.emitter.emit(batch);
                    true
                }
                None => {
                    trace!("flush with nothing pending");
                    false
                }
            }
        };

        if emitted {
            self.scheduler.run(&mut || {});
        }

        let mut state = self.state.lock();
        if state.phase == Phase::Priming {
            if self.policy == DebouncePolicy::PrimingAware {
                debug!("priming complete, switching to steady emission");
            }
            state.phase = Phase::Steady;
        }
    }

    /// Stop accepting changes, discard the buffer and cancel any pending flush.
    pub fn stop(&self) {
        let task = {
            let mut state = self.state.lock();
            state.stopped = true;
            state.pending.clear();
            state.flush_task.take()
        };
        if let Some(id) = task {
            trace!(?id, "cancelling pending flush");
            self.scheduler.cancel_task(id);
        }
    }

    /// Replace the pending flush with one due after `delay`.
    ///
    /// Called without the state lock held; the new id is recorded afterwards.
    fn reschedule(&self, previous: Option<TaskId>, delay: Duration) {
        if let Some(previous) = previous {
            self.scheduler.cancel_task(previous);
        }
        let id = self
            .scheduler
            .schedule_task(self.emit_task().with_delay(delay));

        let displaced = {
            let mut state = self.state.lock();
            if state.stopped {
                Some(id)
            } else {
                state.flush_task.replace(id)
            }
        };
        if let Some(stale) = displaced {
            self.scheduler.cancel_task(stale);
        }
    }

    fn emit_task(&self) -> HostTask {
        let this = self.this.clone();
        HostTask::new(EMIT_TASK, move || {
            if let Some(batcher) = this.upgrade() {
                batcher.flush();
            }
        })
    }
}
