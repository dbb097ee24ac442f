//! Host scheduler trait and task description.

use std::fmt;
use std::time::Duration;

/// Work carried by a scheduled task.
pub type TaskWork = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of a task registered with a host scheduler.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// A unit of tracked work handed to the host.
pub struct HostTask {
    /// Name shown in host diagnostics.
    pub name: &'static str,
    /// How long the host waits before running the task.
    pub delay: Duration,
    /// The work itself.
    pub work: TaskWork,
    /// Invoked if the task is cancelled before it runs.
    pub on_cancel: Option<TaskWork>,
}

impl HostTask {
    /// Create a zero-delay task.
    pub fn new(name: &'static str, work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name,
            delay: Duration::ZERO,
            work: Box::new(work),
            on_cancel: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn on_cancel(mut self, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }
}

impl fmt::Debug for HostTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostTask")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// Scheduling capability supplied by the host application.
///
/// A registered task counts as outstanding work until it has run or been
/// cancelled. Implementations must not hold internal locks while running
/// task work or the closure passed to [`HostScheduler::run`]: both may
/// re-enter the scheduler.
pub trait HostScheduler: Send + Sync {
    /// Register a task to run once `task.delay` has elapsed.
    fn schedule_task(&self, task: HostTask) -> TaskId;

    /// Run a still-pending task right now.
    ///
    /// Returns false if the task already ran or was cancelled.
    fn run_task(&self, id: TaskId) -> bool;

    /// Drop a pending task without running it, invoking its cancel hook.
    ///
    /// Returns false if the task already ran or was cancelled.
    fn cancel_task(&self, id: TaskId) -> bool;

    /// Execute `f` inside the host's tracked context so the host re-checks
    /// whether it has settled.
    fn run(&self, f: &mut dyn FnMut());
}
