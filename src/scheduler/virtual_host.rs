//! Deterministic virtual-clock host scheduler.

use super::host::{HostScheduler, HostTask, TaskId, TaskWork};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// Upper bound on tasks drained by one `run_until_idle` call.
const MAX_IDLE_ITERATIONS: usize = 100_000;

type StableHook = Arc<dyn Fn() + Send + Sync>;

struct PendingTask {
    name: &'static str,
    due: Duration,
    work: TaskWork,
    on_cancel: Option<TaskWork>,
}

#[derive(Default)]
struct VirtualState {
    now: Duration,
    next_id: u64,
    tasks: BTreeMap<TaskId, PendingTask>,
    run_count: u64,
}

/// Host scheduler driven by an explicit virtual clock.
///
/// Nothing runs on its own: tasks fire when the clock is advanced past their
/// due time or when the queue is drained. Tasks due at the same instant run
/// in the order they were scheduled.
#[derive(Default)]
pub struct VirtualScheduler {
    state: Mutex<VirtualState>,
    stable_hooks: RwLock<Vec<StableHook>>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time, measured from creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of tasks registered and not yet run or cancelled.
    pub fn pending_tasks(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// True when no tracked work is outstanding.
    pub fn is_stable(&self) -> bool {
        self.state.lock().tasks.is_empty()
    }

    /// Number of times [`HostScheduler::run`] has been entered.
    pub fn run_count(&self) -> u64 {
        self.state.lock().run_count
    }

    /// Register a callback fired whenever a `run` finishes with no
    /// outstanding tasks.
    pub fn on_stable(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.stable_hooks.write().push(Arc::new(hook));
    }

    /// Move the clock forward, running every task that falls due on the way.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut ran = 0;

        while let Some(task) = self.pop_next(Some(target)) {
            trace!(task = task.name, "running due task");
            (task.work)();
            ran += 1;
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
        ran
    }

    /// Run tasks in due order until none are left, jumping the clock forward
    /// as needed.
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_next(None) {
            trace!(task = task.name, "running task");
            (task.work)();
            ran += 1;
            if ran >= MAX_IDLE_ITERATIONS {
                warn!(ran, "task queue did not drain, giving up");
                break;
            }
        }
        ran
    }

    /// Remove the earliest task due at or before `limit`.
    fn pop_next(&self, limit: Option<Duration>) -> Option<PendingTask> {
        let mut state = self.state.lock();
        let id = state
            .tasks
            .iter()
            .filter(|(_, task)| limit.map_or(true, |limit| task.due <= limit))
            .min_by_key(|(id, task)| (task.due, **id))
            .map(|(id, _)| *id)?;

        let task = state.tasks.remove(&id)?;
        if task.due > state.now {
            state.now = task.due;
        }
        Some(task)
    }

    fn notify_stable(&self) {
        if !self.is_stable() {
            return;
        }
        let hooks: Vec<StableHook> = self.stable_hooks.read().clone();
        for hook in hooks {
            hook();
        }
    }
}

impl HostScheduler for VirtualScheduler {
    fn schedule_task(&self, task: HostTask) -> TaskId {
        let mut state = self.state.lock();
        let id = TaskId(state.next_id);
        state.next_id += 1;

        let due = state.now + task.delay;
        trace!(task = task.name, ?id, ?due, "task scheduled");
        state.tasks.insert(
            id,
            PendingTask {
                name: task.name,
                due,
                work: task.work,
                on_cancel: task.on_cancel,
            },
        );
        id
    }

    fn run_task(&self, id: TaskId) -> bool {
        let task = self.state.lock().tasks.remove(&id);
        match task {
            Some(task) => {
                trace!(task = task.name, ?id, "running task on demand");
                (task.work)();
                true
            }
            None => false,
        }
    }

    fn cancel_task(&self, id: TaskId) -> bool {
        let task = self.state.lock().tasks.remove(&id);
        match task {
            Some(task) => {
                trace!(task = task.name, ?id, "task cancelled");
                if let Some(on_cancel) = task.on_cancel {
                    on_cancel();
                }
                true
            }
            None => false,
        }
    }

    fn run(&self, f: &mut dyn FnMut()) {
        self.state.lock().run_count += 1;
        f();
        self.notify_stable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> TaskWork) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &'static str| -> TaskWork {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_advance_runs_due_tasks_in_order() {
        let scheduler = VirtualScheduler::new();
        let (log, make) = recorder();

        scheduler.schedule_task(HostTask {
            name: "late",
            delay: Duration::from_millis(30),
            work: make("late"),
            on_cancel: None,
        });
        scheduler.schedule_task(HostTask {
            name: "first",
            delay: Duration::from_millis(10),
            work: make("first"),
            on_cancel: None,
        });
        scheduler.schedule_task(HostTask {
            name: "second",
            delay: Duration::from_millis(10),
            work: make("second"),
            on_cancel: None,
        });

        assert_eq!(scheduler.advance(Duration::from_millis(9)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 2);
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert_eq!(scheduler.pending_tasks(), 1);
        assert_eq!(scheduler.now(), Duration::from_millis(10));

        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(scheduler.now(), Duration::from_millis(30));
        assert!(scheduler.is_stable());
    }

    #[test]
    fn test_run_task_and_cancel() {
        let scheduler = VirtualScheduler::new();
        let (log, make) = recorder();
        let cancelled = Arc::new(AtomicUsize::new(0));

        let a = scheduler.schedule_task(HostTask::new("a", make("a")));
        let cancelled_clone = cancelled.clone();
        let b = scheduler.schedule_task(
            HostTask::new("b", make("b"))
                .with_delay(Duration::from_secs(1))
                .on_cancel(move || {
                    cancelled_clone.fetch_add(1, Ordering::SeqCst);
                }),
        );

        assert!(scheduler.run_task(a));
        assert!(!scheduler.run_task(a));
        assert!(scheduler.cancel_task(b));
        assert!(!scheduler.cancel_task(b));

        assert_eq!(*log.lock(), vec!["a"]);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.run_until_idle(), 0);
    }

    #[test]
    fn test_tasks_may_schedule_more_work() {
        let scheduler = Arc::new(VirtualScheduler::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_hits = hits.clone();
        scheduler.schedule_task(HostTask::new("outer", move || {
            let hits = inner_hits.clone();
            inner_scheduler.schedule_task(HostTask::new("inner", move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stable_hook_fires_only_without_pending_work() {
        let scheduler = VirtualScheduler::new();
        let stable = Arc::new(AtomicUsize::new(0));
        let stable_clone = stable.clone();
        scheduler.on_stable(move || {
            stable_clone.fetch_add(1, Ordering::SeqCst);
        });

        let id = scheduler.schedule_task(HostTask::new("pending", || {}));
        scheduler.run(&mut || {});
        assert_eq!(stable.load(Ordering::SeqCst), 0);

        scheduler.cancel_task(id);
        scheduler.run(&mut || {});
        assert_eq!(stable.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.run_count(), 2);
    }
}
