//! Shared test cursor: an in-memory ordered collection that pushes callbacks.

#![allow(dead_code)]

use cursor_observer::{ObserveCallbacks, PushSource, StopHandle};
use parking_lot::Mutex;
use std::sync::Arc;

/// Route observer logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

struct CursorState<T> {
    items: Vec<T>,
    callbacks: Option<ObserveCallbacks<T>>,
    observe_calls: usize,
    stop_calls: usize,
    honor_stop: bool,
}

/// In-memory live collection. Mutations fire the matching callback
/// synchronously while an observation is running.
pub struct TestCursor<T> {
    state: Arc<Mutex<CursorState<T>>>,
}

impl<T> Clone for TestCursor<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> TestCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CursorState {
                items,
                callbacks: None,
                observe_calls: 0,
                stop_calls: 0,
                honor_stop: true,
            })),
        }
    }

    /// A cursor that keeps firing callbacks after `stop`.
    pub fn ignoring_stop(items: Vec<T>) -> Self {
        let cursor = Self::new(items);
        cursor.state.lock().honor_stop = false;
        cursor
    }

    pub fn items(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    pub fn observe_calls(&self) -> usize {
        self.state.lock().observe_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().stop_calls
    }

    pub fn is_observed(&self) -> bool {
        self.state.lock().callbacks.is_some()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn insert(&self, index: usize, item: T) {
        let callbacks = {
            let mut state = self.state.lock();
            state.items.insert(index, item.clone());
            state.callbacks.clone()
        };
        if let Some(callbacks) = callbacks {
            callbacks.added(item, index);
        }
    }

    pub fn push(&self, item: T) {
        let index = self.len();
        self.insert(index, item);
    }

    pub fn update(&self, index: usize, item: T) {
        let (old, callbacks) = {
            let mut state = self.state.lock();
            let old = std::mem::replace(&mut state.items[index], item.clone());
            (old, state.callbacks.clone())
        };
        if let Some(callbacks) = callbacks {
            callbacks.changed(item, old, index);
        }
    }

    pub fn move_item(&self, from_index: usize, to_index: usize) {
        let (item, callbacks) = {
            let mut state = self.state.lock();
            let item = state.items.remove(from_index);
            state.items.insert(to_index, item.clone());
            (item, state.callbacks.clone())
        };
        if let Some(callbacks) = callbacks {
            callbacks.moved(item, from_index, to_index);
        }
    }

    pub fn remove(&self, index: usize) {
        let callbacks = {
            let mut state = self.state.lock();
            state.items.remove(index);
            state.callbacks.clone()
        };
        if let Some(callbacks) = callbacks {
            callbacks.removed(index);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> PushSource<T> for TestCursor<T> {
    fn observe(&mut self, callbacks: ObserveCallbacks<T>) -> Box<dyn StopHandle> {
        let items = {
            let mut state = self.state.lock();
            state.observe_calls += 1;
            state.callbacks = Some(callbacks.clone());
            state.items.clone()
        };

        for (index, item) in items.into_iter().enumerate() {
            callbacks.added(item, index);
        }

        let state = self.state.clone();
        Box::new(move || {
            let mut state = state.lock();
            state.stop_calls += 1;
            if state.honor_stop {
                state.callbacks = None;
            }
        })
    }
}
