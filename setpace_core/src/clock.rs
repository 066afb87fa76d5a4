//! Repeating-task scheduling behind a small trait.
//!
//! The engine never touches wall-clock timers directly. Hosts hand it a
//! [`Scheduler`]: [`EventLoop`] runs tasks in real time on the current
//! thread, [`ManualScheduler`] advances a virtual clock so tests can replay
//! ninety seconds of rest instantly.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`); tasks run one at a
//! time on the thread that drives the scheduler.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A repeating task
pub type Task = Box<dyn FnMut()>;

/// Something that can run a task at a fixed interval until cancelled
pub trait Scheduler {
    /// Run `task` every `interval`, first after one interval has elapsed.
    fn schedule_repeating(&self, interval: Duration, task: Task) -> CancelHandle;
}

/// Cancels its task on [`cancel`](CancelHandle::cancel) or when dropped
#[derive(Debug)]
pub struct CancelHandle {
    cancelled: Rc<Cell<bool>>,
}

impl CancelHandle {
    fn new() -> (Self, Rc<Cell<bool>>) {
        let flag = Rc::new(Cell::new(false));
        (
            Self {
                cancelled: flag.clone(),
            },
            flag,
        )
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancelled.set(true);
    }
}

struct Entry {
    interval: Duration,
    next_due: Duration,
    cancelled: Rc<Cell<bool>>,
    task: Rc<RefCell<Task>>,
}

/// Tasks keyed by their next due offset from the scheduler's origin
#[derive(Default)]
struct TaskQueue {
    entries: RefCell<Vec<Entry>>,
}

impl TaskQueue {
    fn push(&self, now: Duration, interval: Duration, task: Task) -> CancelHandle {
        let interval = interval.max(Duration::from_millis(1));
        let (handle, cancelled) = CancelHandle::new();
        self.entries.borrow_mut().push(Entry {
            interval,
            next_due: now + interval,
            cancelled,
            task: Rc::new(RefCell::new(task)),
        });
        handle
    }

    /// Pop the earliest task due at or before `now` and reschedule it.
    ///
    /// The queue is not borrowed while the returned task runs, so tasks may
    /// schedule or cancel other tasks.
    fn take_due(&self, now: Duration) -> Option<(Duration, Rc<RefCell<Task>>)> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|e| !e.cancelled.get());

        let entry = entries
            .iter_mut()
            .filter(|e| e.next_due <= now)
            .min_by_key(|e| e.next_due)?;
        let due = entry.next_due;
        entry.next_due += entry.interval;
        Some((due, entry.task.clone()))
    }

    fn next_due(&self) -> Option<Duration> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|e| !e.cancelled.get());
        entries.iter().map(|e| e.next_due).min()
    }

    fn active(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| !e.cancelled.get())
            .count()
    }
}

/// Deterministic scheduler driven by explicit [`advance`](ManualScheduler::advance) calls
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    queue: TaskQueue,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Move the virtual clock forward, running every task that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        while let Some((due, task)) = self.queue.take_due(target) {
            self.now.set(due);
            (task.borrow_mut())();
        }
        self.now.set(target);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Number of tasks that have not been cancelled
    pub fn active_tasks(&self) -> usize {
        self.queue.active()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, task: Task) -> CancelHandle {
        self.queue.push(self.now.get(), interval, task)
    }
}

/// Real-time, single-threaded scheduler
pub struct EventLoop {
    origin: Instant,
    poll_interval: Duration,
    queue: TaskQueue,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            poll_interval: Duration::from_millis(50),
            queue: TaskQueue::default(),
        }
    }

    /// Longest sleep between calls to the poll closure in [`run_until`](EventLoop::run_until)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    /// Run due tasks until `poll` returns true.
    ///
    /// `poll` is called between tasks at least every poll interval; hosts use
    /// it to feed user input into the engine on the same thread.
    pub fn run_until<F>(&self, mut poll: F)
    where
        F: FnMut() -> bool,
    {
        loop {
            if poll() {
                break;
            }

            while let Some((_, task)) = self.queue.take_due(self.elapsed()) {
                (task.borrow_mut())();
            }

            let wait = match self.queue.next_due() {
                Some(due) => due.saturating_sub(self.elapsed()).min(self.poll_interval),
                None => self.poll_interval,
            };
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
        }
    }

    pub fn active_tasks(&self) -> usize {
        self.queue.active()
    }
}

impl Scheduler for EventLoop {
    fn schedule_repeating(&self, interval: Duration, task: Task) -> CancelHandle {
        self.queue.push(self.elapsed(), interval, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Task) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, Box::new(move || c.set(c.get() + 1)))
    }

    #[test]
    fn test_manual_scheduler_fires_each_interval() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counter();
        let _handle = scheduler.schedule_repeating(Duration::from_secs(1), task);

        scheduler.advance(Duration::from_millis(999));
        assert_eq!(count.get(), 0);

        scheduler.advance(Duration::from_millis(1));
        assert_eq!(count.get(), 1);

        scheduler.advance_secs(9);
        assert_eq!(count.get(), 10);
        assert_eq!(scheduler.now(), Duration::from_secs(10));
    }

    #[test]
    fn test_cancel_and_drop_stop_tasks() {
        let scheduler = ManualScheduler::new();
        let (count_a, task_a) = counter();
        let (count_b, task_b) = counter();

        let handle_a = scheduler.schedule_repeating(Duration::from_secs(1), task_a);
        let handle_b = scheduler.schedule_repeating(Duration::from_secs(1), task_b);
        assert_eq!(scheduler.active_tasks(), 2);

        scheduler.advance_secs(2);
        handle_a.cancel();
        drop(handle_b);
        scheduler.advance_secs(5);

        assert_eq!(count_a.get(), 2);
        assert_eq!(count_b.get(), 2);
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_task_can_cancel_itself() {
        let scheduler = ManualScheduler::new();
        let slot: Rc<RefCell<Option<CancelHandle>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));

        let task_slot = slot.clone();
        let task_count = count.clone();
        let handle = scheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                task_count.set(task_count.get() + 1);
                if task_count.get() == 3 {
                    task_slot.borrow_mut().take();
                }
            }),
        );
        *slot.borrow_mut() = Some(handle);

        scheduler.advance_secs(10);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_interleaved_intervals_fire_in_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let fast_log = log.clone();
        let _fast = scheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || fast_log.borrow_mut().push("fast")),
        );
        let slow_log = log.clone();
        let _slow = scheduler.schedule_repeating(
            Duration::from_millis(2500),
            Box::new(move || slow_log.borrow_mut().push("slow")),
        );

        scheduler.advance_secs(3);
        assert_eq!(*log.borrow(), vec!["fast", "fast", "slow", "fast"]);
    }

    #[test]
    fn test_event_loop_runs_until_poll_says_stop() {
        let event_loop = EventLoop::new().with_poll_interval(Duration::from_millis(1));
        let (count, task) = counter();
        let _handle = event_loop.schedule_repeating(Duration::from_millis(2), task);

        let watched = count.clone();
        event_loop.run_until(|| watched.get() >= 3);
        assert!(count.get() >= 3);
    }
}
