//! Translation of raw source callbacks into [`Change`] records.

use crate::batcher::Batcher;
use crate::types::Change;
use std::sync::Arc;

/// Stateless mapping from the four raw callback shapes to [`Change`].
pub struct ChangeRecorder;

impl ChangeRecorder {
    pub fn added<T>(item: T, index: usize) -> Change<T> {
        Change::Add { index, item }
    }

    /// The previous item is discarded.
    pub fn changed<T>(new_item: T, _old_item: T, index: usize) -> Change<T> {
        Change::Update {
            index,
            item: new_item,
        }
    }

    /// The moved item itself is discarded.
    pub fn moved<T>(_item: T, from_index: usize, to_index: usize) -> Change<T> {
        Change::Move {
            from_index,
            to_index,
        }
    }

    pub fn removed<T>(index: usize) -> Change<T> {
        Change::Remove { index }
    }
}

/// Callbacks handed to a live source when observation starts.
///
/// The source calls these in collection order; each call is recorded and
/// buffered by the observer's batcher. Calls made after the observer has
/// been destroyed are ignored.
pub struct ObserveCallbacks<T> {
    batcher: Arc<Batcher<T>>,
}

impl<T> Clone for ObserveCallbacks<T> {
    fn clone(&self) -> Self {
        Self {
            batcher: self.batcher.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ObserveCallbacks<T> {
    pub(crate) fn new(batcher: Arc<Batcher<T>>) -> Self {
        Self { batcher }
    }

    pub fn added(&self, item: T, index: usize) {
        self.batcher.push(ChangeRecorder::added(item, index));
    }

    pub fn changed(&self, new_item: T, old_item: T, index: usize) {
        self.batcher
            .push(ChangeRecorder::changed(new_item, old_item, index));
    }

    pub fn moved(&self, item: T, from_index: usize, to_index: usize) {
        self.batcher
            .push(ChangeRecorder::moved(item, from_index, to_index));
    }

    pub fn removed(&self, index: usize) {
        self.batcher.push(ChangeRecorder::removed(index));
    }
}
