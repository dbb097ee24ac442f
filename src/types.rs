//! Core types for the cursor observer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Default quiet period before a burst of changes is flushed.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// One positional mutation of the mirrored collection.
///
/// Indices are positions in the ordered collection at the moment the
/// underlying event fired. They are never checked against bounds here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change<T> {
    /// An item was inserted at `index`.
    Add { index: usize, item: T },
    /// The item at `index` was replaced by `item`.
    Update { index: usize, item: T },
    /// The item at `from_index` moved to `to_index`.
    Move { from_index: usize, to_index: usize },
    /// The item at `index` was removed.
    Remove { index: usize },
}

/// Discriminant of a [`Change`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Update,
    Move,
    Remove,
}

impl<T> Change<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Add { .. } => ChangeKind::Add,
            Change::Update { .. } => ChangeKind::Update,
            Change::Move { .. } => ChangeKind::Move,
            Change::Remove { .. } => ChangeKind::Remove,
        }
    }

    /// Position affected by this change. For moves, the destination.
    pub fn index(&self) -> usize {
        match self {
            Change::Add { index, .. } | Change::Update { index, .. } | Change::Remove { index } => {
                *index
            }
            Change::Move { to_index, .. } => *to_index,
        }
    }

    /// Item carried by the change, if any.
    pub fn item(&self) -> Option<&T> {
        match self {
            Change::Add { item, .. } | Change::Update { item, .. } => Some(item),
            Change::Move { .. } | Change::Remove { .. } => None,
        }
    }
}

/// Ordered, non-empty group of changes emitted as one notification.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeBatch<T> {
    changes: Vec<Change<T>>,
}

impl<T> ChangeBatch<T> {
    /// Wrap a list of changes. Returns `None` for an empty list.
    pub fn new(changes: Vec<Change<T>>) -> Option<Self> {
        if changes.is_empty() {
            None
        } else {
            Some(Self { changes })
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Always false for a constructed batch.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change<T>] {
        &self.changes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change<T>> {
        self.changes.iter()
    }

    pub fn into_changes(self) -> Vec<Change<T>> {
        self.changes
    }
}

impl<T: Clone> ChangeBatch<T> {
    /// Replay this batch onto a local mirror of the collection.
    ///
    /// Changes whose indices fall outside the mirror are skipped.
    /// Returns the number of changes applied.
    pub fn apply_to(&self, mirror: &mut Vec<T>) -> usize {
        let mut applied = 0;
        for change in &self.changes {
            let ok = match change {
                Change::Add { index, item } if *index <= mirror.len() => {
                    mirror.insert(*index, item.clone());
                    true
                }
                Change::Update { index, item } if *index < mirror.len() => {
                    mirror[*index] = item.clone();
                    true
                }
                Change::Move {
                    from_index,
                    to_index,
                } if *from_index < mirror.len() && *to_index < mirror.len() => {
                    let moved = mirror.remove(*from_index);
                    mirror.insert(*to_index, moved);
                    true
                }
                Change::Remove { index } if *index < mirror.len() => {
                    mirror.remove(*index);
                    true
                }
                _ => false,
            };
            if ok {
                applied += 1;
            } else {
                warn!(
                    kind = ?change.kind(),
                    index = change.index(),
                    len = mirror.len(),
                    "change out of range for mirror, skipped"
                );
            }
        }
        applied
    }
}

impl<T: fmt::Debug> fmt::Debug for ChangeBatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.changes.iter()).finish()
    }
}

impl<T> IntoIterator for ChangeBatch<T> {
    type Item = Change<T>;
    type IntoIter = std::vec::IntoIter<Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ChangeBatch<T> {
    type Item = &'a Change<T>;
    type IntoIter = std::slice::Iter<'a, Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// How the observer engages its source on first subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngageMode {
    /// Observe live when the source can push, otherwise enumerate once.
    #[default]
    Auto,
    /// Always enumerate once, never keep a live observation.
    Fetch,
}

/// Observer configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Quiet period in milliseconds before buffered changes are flushed.
    /// Zero selects the priming-aware policy.
    /// Default: 50
    pub debounce_ms: u64,

    /// Source engagement mode.
    /// Default: `EngageMode::Auto`
    pub engage: EngageMode,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            engage: EngageMode::Auto,
        }
    }
}

impl ObserverConfig {
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_engage(mut self, engage: EngageMode) -> Self {
        self.engage = engage;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Lifecycle state of an observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverState {
    /// Bound to a source, not observing yet.
    Inert,
    /// First subscription is engaging the source.
    Starting,
    /// A live observation is running.
    LiveObserving,
    /// The one-shot enumeration has been emitted.
    BulkDone,
    /// Destroyed. Terminal.
    Stopped,
}
