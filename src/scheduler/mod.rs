//! Host scheduler capability.
//!
//! The observer never touches ambient scheduling state. Every flush runs as a
//! task registered with an injected [`HostScheduler`], so the host can tell
//! when the work triggered by a change burst has settled.
//!
//! [`VirtualScheduler`] is a deterministic, virtual-clock host that embedders
//! without their own event loop (and the test suites) can use directly.

mod host;
mod virtual_host;

pub use host::{HostScheduler, HostTask, TaskId, TaskWork};
pub use virtual_host::VirtualScheduler;
