//! # Cursor Observer
//!
//! Mirrors a live, ordered collection into a stream of batched, index-based
//! change notifications.
//!
//! ## Core Concepts
//!
//! - **Changes**: `Add`, `Update`, `Move` and `Remove` records carrying positions
//! - **Batches**: ordered, non-empty groups of changes emitted together
//! - **Debouncing**: bursts of source callbacks are coalesced before emission
//! - **Host scheduling**: every flush runs as a task of an injected scheduler,
//!   so the host can tell when the work has settled
//!
//! ## Example
//!
//! ```ignore
//! use cursor_observer::{CollectionObserver, ObserverConfig, Source, VirtualScheduler};
//!
//! let scheduler = Arc::new(VirtualScheduler::new());
//! let observer = CollectionObserver::new(
//!     Source::push(cursor),
//!     scheduler.clone(),
//!     ObserverConfig::default(),
//! )?;
//!
//! // The first subscription starts observing the cursor
//! let handle = observer.subscribe()?;
//!
//! // Let the debounce window elapse
//! scheduler.advance(Duration::from_millis(50));
//! for batch in handle.try_batches() {
//!     println!("{} changes", batch.len());
//! }
//!
//! observer.destroy();
//! ```

pub mod batcher;
pub mod error;
pub mod observer;
pub mod recorder;
pub mod scheduler;
pub mod source;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use batcher::{Batcher, DebouncePolicy, Phase};
pub use error::{ObserverError, Result};
pub use observer::CollectionObserver;
pub use recorder::{ChangeRecorder, ObserveCallbacks};
pub use scheduler::{HostScheduler, HostTask, TaskId, TaskWork, VirtualScheduler};
pub use source::{ObserverHandle, PullSource, PushSource, Source, StopHandle};
pub use subscriptions::{
    ChangeEmitter, DropReason, ObserverEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};
pub use types::*;
