//! Reactive source capabilities.
//!
//! A source can push incremental callbacks ([`PushSource`]), enumerate its
//! current contents once ([`PullSource`]), or both. [`Source`] bundles what
//! a concrete collection offers; the observer resolves it into a single
//! [`SourceKind`] at construction.

use crate::error::{ObserverError, Result};
use crate::recorder::ObserveCallbacks;
use crate::types::EngageMode;
use std::fmt;

/// Stop capability returned by a live observation.
pub trait StopHandle: Send {
    fn stop(&mut self);
}

impl<F: FnMut() + Send> StopHandle for F {
    fn stop(&mut self) {
        self()
    }
}

/// A collection that pushes change callbacks once observed.
///
/// `observe` may call back synchronously, typically one `added` per existing
/// item, before it returns.
pub trait PushSource<T>: Send {
    fn observe(&mut self, callbacks: ObserveCallbacks<T>) -> Box<dyn StopHandle>;
}

/// A collection that can enumerate its items in order.
pub trait PullSource<T>: Send {
    fn fetch_all(&mut self) -> Vec<T>;
}

impl<T, F: FnMut() -> Vec<T> + Send> PullSource<T> for F {
    fn fetch_all(&mut self) -> Vec<T> {
        self()
    }
}

impl<T: Clone + Send> PullSource<T> for Vec<T> {
    fn fetch_all(&mut self) -> Vec<T> {
        self.clone()
    }
}

/// Capabilities a collection exposes to an observer.
pub struct Source<T> {
    push: Option<Box<dyn PushSource<T>>>,
    pull: Option<Box<dyn PullSource<T>>>,
}

impl<T> Source<T> {
    /// A source with no capabilities. Rejected by the observer.
    pub fn empty() -> Self {
        Self {
            push: None,
            pull: None,
        }
    }

    pub fn push(source: impl PushSource<T> + 'static) -> Self {
        Self::empty().with_push(source)
    }

    pub fn pull(source: impl PullSource<T> + 'static) -> Self {
        Self::empty().with_pull(source)
    }

    pub fn with_push(mut self, source: impl PushSource<T> + 'static) -> Self {
        self.push = Some(Box::new(source));
        self
    }

    pub fn with_pull(mut self, source: impl PullSource<T> + 'static) -> Self {
        self.pull = Some(Box::new(source));
        self
    }

    pub fn can_push(&self) -> bool {
        self.push.is_some()
    }

    pub fn can_pull(&self) -> bool {
        self.pull.is_some()
    }

    /// Pick the single capability this observer will engage.
    pub(crate) fn resolve(self, mode: EngageMode) -> Result<SourceKind<T>> {
        match (mode, self.push, self.pull) {
            (EngageMode::Auto, Some(push), _) => Ok(SourceKind::Push(push)),
            (_, _, Some(pull)) => Ok(SourceKind::Pull(pull)),
            (EngageMode::Fetch, Some(_), None) => Err(ObserverError::InvalidSource(
                "fetch mode requires an enumerable source".to_string(),
            )),
            (_, None, None) => Err(ObserverError::InvalidSource(
                "source can neither be observed nor enumerated".to_string(),
            )),
        }
    }
}

impl<T> fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("push", &self.can_push())
            .field("pull", &self.can_pull())
            .finish()
    }
}

/// The capability an observer engages on first subscription.
pub(crate) enum SourceKind<T> {
    Push(Box<dyn PushSource<T>>),
    Pull(Box<dyn PullSource<T>>),
}

/// Exclusive owner of a live observation's stop capability.
pub struct ObserverHandle {
    stop: Box<dyn StopHandle>,
}

impl ObserverHandle {
    pub(crate) fn new(stop: Box<dyn StopHandle>) -> Self {
        Self { stop }
    }

    /// Stop the observation. Consumes the handle so this happens once.
    pub fn stop(mut self) {
        self.stop.stop();
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObserverHandle")
    }
}
