//! Subscriber fan-out for change batches.
//!
//! Every observer owns one [`ChangeEmitter`]; all of its subscribers share
//! the single underlying observation and receive the same batches:
//! - Bounded per-subscriber buffers with slow-subscriber dropping
//! - Optional replay of the most recent batch for late subscribers
//! - A final `Dropped` event when the observer is destroyed
//!
//! # Example
//!
//! ```ignore
//! let handle = observer.subscribe()?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(ObserverEvent::Changes { batch }) => batch.apply_to(&mut mirror),
//!         Ok(ObserverEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     };
//! }
//! ```

mod manager;
mod types;

pub use manager::ChangeEmitter;
pub use types::{DropReason, ObserverEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
