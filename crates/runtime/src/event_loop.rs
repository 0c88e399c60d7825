//! Event loop driving the runtime's microtasks and timers.

use crate::clock::ManualClock;
use crate::runtime::Scheduler;
use common::{DevToolsError, DevToolsResult};
use std::sync::Arc;
use std::time::Duration;

/// Event loop for a [`Scheduler`]'s runtime.
pub struct EventLoop {
    /// Handle to the shared runtime.
    scheduler: Scheduler,
    /// Set when the loop runs on a manual clock.
    manual_clock: Option<Arc<ManualClock>>,
    /// Whether the loop is running.
    running: bool,
}

impl EventLoop {
    /// Create an event loop on the wall clock.
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler::system(),
            manual_clock: None,
            running: false,
        }
    }

    /// Create an event loop on a manual clock starting at `start_ms`.
    pub fn manual(start_ms: u64) -> Self {
        let (scheduler, clock) = Scheduler::manual(start_ms);
        Self {
            scheduler,
            manual_clock: Some(clock),
            running: false,
        }
    }

    /// Handle for scheduling work on this loop.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    /// Current loop time.
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    /// Run a single iteration of the event loop.
    pub fn tick(&mut self) {
        // 1. Run all microtasks
        self.drain_microtasks();

        // 2. Fire every timer that is due
        self.process_timers();

        // 3. Timers may have queued microtasks
        self.drain_microtasks();
    }

    /// Drain all microtasks.
    fn drain_microtasks(&mut self) {
        let runtime = self.scheduler.runtime();

        loop {
            let task = runtime.write().next_microtask();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Fire due timers one at a time so callbacks see each other's cancellations.
    fn process_timers(&mut self) {
        let runtime = self.scheduler.runtime();

        loop {
            let ready = runtime.write().take_ready_timer();
            match ready {
                Some((_, callback)) => callback(),
                None => break,
            }
        }
    }

    /// Tick until nothing is immediately runnable. Future timers stay queued.
    pub fn run_until_idle(&mut self) {
        self.running = true;

        loop {
            self.tick();

            let runtime = self.scheduler.runtime();
            let runtime = runtime.read();
            let due = runtime
                .next_timer_deadline()
                .map(|deadline| deadline <= runtime.now_ms())
                .unwrap_or(false);

            if !runtime.has_microtasks() && !due {
                break;
            }
        }

        self.running = false;
    }

    /// Move a manual clock forward by `delta`, firing every timer that falls due
    /// on the way in deadline order.
    pub fn advance_by(&mut self, delta: Duration) -> DevToolsResult<()> {
        let clock = self
            .manual_clock
            .clone()
            .ok_or_else(|| DevToolsError::invalid_state("advance_by needs a manual clock"))?;

        let target = self.now_ms() + delta.as_millis() as u64;
        self.run_until_idle();

        while let Some(deadline) = self.next_deadline() {
            if deadline > target {
                break;
            }
            clock.set(deadline);
            self.run_until_idle();
        }

        clock.set(target);
        self.run_until_idle();
        Ok(())
    }

    /// Drive the loop for `duration` of loop time.
    ///
    /// On the wall clock this sleeps between deadlines and returns early once
    /// the runtime is stopped; on a manual clock it is the same as
    /// [`EventLoop::advance_by`].
    pub async fn run_for(&mut self, duration: Duration) -> DevToolsResult<()> {
        if self.manual_clock.is_some() {
            return self.advance_by(duration);
        }

        let end = self.now_ms() + duration.as_millis() as u64;
        let runtime = self.scheduler.runtime();

        loop {
            self.run_until_idle();

            let now = self.now_ms();
            if now >= end || !runtime.read().is_running() {
                break;
            }

            let wake_at = self.next_deadline().map(|d| d.min(end)).unwrap_or(end);
            let wait = wake_at.saturating_sub(now).max(1);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }

        Ok(())
    }

    /// Get the next deadline (for integration with external event loops).
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.runtime().read().next_timer_deadline()
    }

    /// Check if there's pending work.
    pub fn has_pending_work(&self) -> bool {
        self.scheduler.runtime().read().has_pending_work()
    }

    /// Stop the event loop.
    pub fn stop(&mut self) {
        self.running = false;
        self.scheduler.runtime().write().stop();
    }

    /// Check if the event loop is running.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
