//! Timer and microtask queues of the host runtime.

use crate::clock::{Clock, ManualClock, SystemClock};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Timer identifier handed out by [`Runtime::add_timer`].
pub type TimerId = u32;

/// Timer callback. Repeating timers call it once per period.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// One-shot job queued ahead of timers.
pub type Microtask = Box<dyn FnOnce() + Send + Sync>;

/// Runtime state: pending timers and queued microtasks.
pub struct Runtime {
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Pending timers.
    timers: Vec<Timer>,
    /// Timer ID counter.
    timer_counter: u32,
    /// Microtask queue.
    microtasks: VecDeque<Microtask>,
    /// Whether the runtime is running.
    running: bool,
}

impl Runtime {
    /// Create a runtime on the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            timers: Vec::new(),
            timer_counter: 0,
            microtasks: VecDeque::new(),
            running: true,
        }
    }

    /// Current time of the runtime clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Add a timer.
    pub fn add_timer(&mut self, callback: TimerCallback, delay: Duration, repeat: bool) -> TimerId {
        self.timer_counter += 1;
        let id = self.timer_counter;

        self.timers.push(Timer {
            id,
            callback,
            scheduled_at: self.clock.now_ms(),
            delay,
            repeat,
        });

        id
    }

    /// Cancel a timer. Unknown or already fired ids are ignored.
    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        before != self.timers.len()
    }

    /// Remove the earliest due timer and return its callback.
    ///
    /// Repeating timers are rescheduled from the current time before being
    /// returned, so a callback may cancel its own timer.
    pub fn take_ready_timer(&mut self) -> Option<(TimerId, TimerCallback)> {
        let now = self.clock.now_ms();

        let position = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline() <= now)
            .min_by_key(|(_, t)| (t.deadline(), t.id))
            .map(|(i, _)| i)?;

        let timer = &mut self.timers[position];
        let fired = (timer.id, timer.callback.clone());

        if timer.repeat {
            timer.scheduled_at = now;
        } else {
            self.timers.remove(position);
        }

        Some(fired)
    }

    /// Queue a microtask.
    pub fn queue_microtask(&mut self, task: Microtask) {
        self.microtasks.push_back(task);
    }

    /// Get the next microtask.
    pub fn next_microtask(&mut self) -> Option<Microtask> {
        self.microtasks.pop_front()
    }

    /// Check if there are pending microtasks.
    pub fn has_microtasks(&self) -> bool {
        !self.microtasks.is_empty()
    }

    /// Number of live timers.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Whether a timer is still scheduled.
    pub fn has_timer(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    /// Check if the runtime has any pending work.
    pub fn has_pending_work(&self) -> bool {
        !self.timers.is_empty() || !self.microtasks.is_empty()
    }

    /// Stop the runtime.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Check if the runtime is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get the next timer deadline.
    pub fn next_timer_deadline(&self) -> Option<u64> {
        self.timers.iter().map(Timer::deadline).min()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

/// A timer.
#[derive(Clone)]
pub struct Timer {
    /// Timer ID.
    pub id: TimerId,
    /// Callback to execute.
    pub callback: TimerCallback,
    /// When the timer was (re)scheduled, epoch ms.
    pub scheduled_at: u64,
    /// Delay before firing.
    pub delay: Duration,
    /// Whether to repeat.
    pub repeat: bool,
}

impl Timer {
    /// Absolute time at which the timer is due.
    pub fn deadline(&self) -> u64 {
        self.scheduled_at + self.delay.as_millis() as u64
    }
}

/// Cloneable handle for scheduling work on a shared [`Runtime`].
#[derive(Clone)]
pub struct Scheduler {
    runtime: Arc<RwLock<Runtime>>,
}

impl Scheduler {
    /// Create a scheduler on a fresh runtime.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            runtime: Arc::new(RwLock::new(Runtime::new(clock))),
        }
    }

    /// Scheduler on the wall clock.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Scheduler on a manual clock, returned alongside it.
    pub fn manual(start_ms: u64) -> (Self, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        (Self::new(clock.clone()), clock)
    }

    /// Shared runtime behind this handle.
    pub fn runtime(&self) -> Arc<RwLock<Runtime>> {
        self.runtime.clone()
    }

    /// Current runtime time.
    pub fn now_ms(&self) -> u64 {
        self.runtime.read().now_ms()
    }

    /// Run `callback` once after `delay`.
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.runtime.write().add_timer(Arc::new(callback), delay, false)
    }

    /// Run `callback` every `period`. A zero period is raised to 1 ms.
    pub fn set_interval<F>(&self, period: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        self.runtime.write().add_timer(Arc::new(callback), period, true)
    }

    /// Cancel a timeout or interval.
    pub fn clear_timer(&self, id: TimerId) -> bool {
        self.runtime.write().cancel_timer(id)
    }

    /// Queue a one-shot job for the next microtask checkpoint.
    pub fn queue_microtask<F>(&self, task: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.runtime.write().queue_microtask(Box::new(task));
    }

    /// Whether a timer is still scheduled.
    pub fn has_timer(&self, id: TimerId) -> bool {
        self.runtime.read().has_timer(id)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::system()
    }
}
