//! Throttle/debounce wrapper for callbacks.
//!
//! A [`RateLimiter`] invokes its callback at most once per interval. Pending
//! trailing calls live on the runtime's timer queue and are replaced by every
//! new call that lands inside the window.

use crate::runtime::{Scheduler, TimerId};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Edge policy of a [`RateLimiter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitMode {
    /// Run immediately when the interval has elapsed since the last run,
    /// otherwise once at the end of the remaining wait.
    Throttle,
    /// Restart the window on every call. With `at_begin` the first call of a
    /// quiet period runs immediately and the rest are dropped; without it the
    /// last call runs once the window closes.
    Debounce { at_begin: bool },
}

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

struct LimiterState<A> {
    /// Time of the last real invocation.
    last_exec: Option<u64>,
    /// Pending timer, trailing call or window end.
    pending: Option<TimerId>,
    /// Arguments for the pending trailing call.
    pending_args: Option<A>,
}

struct Inner<A> {
    scheduler: Scheduler,
    interval: Duration,
    no_trailing: bool,
    mode: LimitMode,
    callback: Callback<A>,
    state: Mutex<LimiterState<A>>,
}

/// Rate-limited callback.
pub struct RateLimiter<A> {
    inner: Arc<Inner<A>>,
}

enum Plan {
    Nothing,
    Trailing(Duration),
    WindowOnly(Duration),
}

impl<A: Send + 'static> RateLimiter<A> {
    /// Wrap `callback` so it runs at most once per `interval`.
    pub fn new<F>(
        scheduler: Scheduler,
        interval: Duration,
        no_trailing: bool,
        mode: LimitMode,
        callback: F,
    ) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                interval,
                no_trailing,
                mode,
                callback: Arc::new(callback),
                state: Mutex::new(LimiterState {
                    last_exec: None,
                    pending: None,
                    pending_args: None,
                }),
            }),
        }
    }

    /// Invoke through the limiter.
    pub fn call(&self, args: A) {
        let inner = &self.inner;
        let now = inner.scheduler.now_ms();
        let interval_ms = inner.interval.as_millis() as u64;
        let mut run_now = None;

        {
            let mut state = inner.state.lock();
            let elapsed = state.last_exec.map(|last| now.saturating_sub(last));
            let in_window = state.pending.is_some();

            if let Some(id) = state.pending.take() {
                inner.scheduler.clear_timer(id);
            }

            let plan = match inner.mode {
                LimitMode::Debounce { at_begin: true } => {
                    if !in_window {
                        state.last_exec = Some(now);
                        run_now = Some(args);
                    }
                    Plan::WindowOnly(inner.interval)
                }
                LimitMode::Debounce { at_begin: false } => {
                    if inner.no_trailing {
                        Plan::Nothing
                    } else {
                        state.pending_args = Some(args);
                        Plan::Trailing(inner.interval)
                    }
                }
                LimitMode::Throttle => match elapsed {
                    Some(elapsed) if elapsed <= interval_ms => {
                        if inner.no_trailing {
                            Plan::Nothing
                        } else {
                            state.pending_args = Some(args);
                            Plan::Trailing(Duration::from_millis(interval_ms - elapsed))
                        }
                    }
                    _ => {
                        state.last_exec = Some(now);
                        state.pending_args = None;
                        run_now = Some(args);
                        Plan::Nothing
                    }
                },
            };

            state.pending = match plan {
                Plan::Nothing => None,
                Plan::Trailing(delay) => {
                    let weak = Arc::downgrade(inner);
                    Some(inner.scheduler.set_timeout(delay, move || fire_trailing(&weak)))
                }
                Plan::WindowOnly(delay) => {
                    let weak = Arc::downgrade(inner);
                    Some(inner.scheduler.set_timeout(delay, move || close_window(&weak)))
                }
            };
        }

        if let Some(args) = run_now {
            (inner.callback)(args);
        }
    }

    /// Drop a pending trailing call, if any.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if let Some(id) = state.pending.take() {
            self.inner.scheduler.clear_timer(id);
        }
        state.pending_args = None;
    }

    /// Whether a trailing call is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending_args.is_some()
    }

    /// Configured interval.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }
}

fn fire_trailing<A>(weak: &Weak<Inner<A>>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    let args = {
        let mut state = inner.state.lock();
        state.pending = None;
        state.last_exec = Some(inner.scheduler.now_ms());
        state.pending_args.take()
    };

    if let Some(args) = args {
        (inner.callback)(args);
    }
}

fn close_window<A>(weak: &Weak<Inner<A>>) {
    if let Some(inner) = weak.upgrade() {
        inner.state.lock().pending = None;
    }
}

/// Build a debounced limiter: leading edge when `at_begin`, trailing otherwise.
pub fn debounce<A, F>(scheduler: Scheduler, delay: Duration, at_begin: bool, callback: F) -> RateLimiter<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    RateLimiter::new(scheduler, delay, false, LimitMode::Debounce { at_begin }, callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;

    fn recorder() -> (Arc<Mutex<Vec<(u32, u64)>>>, impl Fn(u32) + Send + Sync + Clone) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |n| sink.lock().push((n, 0)))
    }

    #[test]
    fn test_trailing_debounce_fires_once_with_last_args() {
        let mut event_loop = EventLoop::manual(0);
        let (calls, sink) = recorder();
        let limiter = debounce(event_loop.scheduler(), Duration::from_millis(350), false, sink);

        for n in 1..=5 {
            limiter.call(n);
            event_loop.advance_by(Duration::from_millis(50)).unwrap();
        }
        assert!(calls.lock().is_empty());
        assert!(limiter.is_pending());

        event_loop.advance_by(Duration::from_millis(350)).unwrap();
        assert_eq!(calls.lock().iter().map(|c| c.0).collect::<Vec<_>>(), vec![5]);
        assert!(!limiter.is_pending());
    }

    #[test]
    fn test_trailing_debounce_window_restarts_on_each_call() {
        let mut event_loop = EventLoop::manual(0);
        let (calls, sink) = recorder();
        let limiter = debounce(event_loop.scheduler(), Duration::from_millis(10), false, sink);

        limiter.call(1);
        event_loop.advance_by(Duration::from_millis(9)).unwrap();
        limiter.call(2);
        event_loop.advance_by(Duration::from_millis(9)).unwrap();
        assert!(calls.lock().is_empty());

        event_loop.advance_by(Duration::from_millis(1)).unwrap();
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(calls.lock()[0].0, 2);
    }

    #[test]
    fn test_leading_debounce_runs_first_call_only() {
        let mut event_loop = EventLoop::manual(0);
        let (calls, sink) = recorder();
        let limiter = debounce(event_loop.scheduler(), Duration::from_millis(100), true, sink);

        limiter.call(1);
        limiter.call(2);
        event_loop.advance_by(Duration::from_millis(50)).unwrap();
        limiter.call(3);
        assert_eq!(calls.lock().iter().map(|c| c.0).collect::<Vec<_>>(), vec![1]);

        // Quiet period over: the next call runs right away again.
        event_loop.advance_by(Duration::from_millis(100)).unwrap();
        limiter.call(4);
        assert_eq!(calls.lock().iter().map(|c| c.0).collect::<Vec<_>>(), vec![1, 4]);
    }

    #[test]
    fn test_throttle_runs_immediately_then_trails() {
        let mut event_loop = EventLoop::manual(1_000);
        let (calls, sink) = recorder();
        let limiter = RateLimiter::new(
            event_loop.scheduler(),
            Duration::from_millis(100),
            false,
            LimitMode::Throttle,
            sink,
        );

        limiter.call(1);
        assert_eq!(calls.lock().len(), 1);

        event_loop.advance_by(Duration::from_millis(30)).unwrap();
        limiter.call(2);
        limiter.call(3);
        assert_eq!(calls.lock().len(), 1);

        // Remaining wait is 70 ms from the last call.
        event_loop.advance_by(Duration::from_millis(69)).unwrap();
        assert_eq!(calls.lock().len(), 1);
        event_loop.advance_by(Duration::from_millis(1)).unwrap();
        assert_eq!(calls.lock().iter().map(|c| c.0).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_throttle_without_trailing_edge_drops_calls() {
        let mut event_loop = EventLoop::manual(0);
        let (calls, sink) = recorder();
        let limiter = RateLimiter::new(
            event_loop.scheduler(),
            Duration::from_millis(100),
            true,
            LimitMode::Throttle,
            sink,
        );

        limiter.call(1);
        limiter.call(2);
        event_loop.advance_by(Duration::from_millis(500)).unwrap();
        assert_eq!(calls.lock().iter().map(|c| c.0).collect::<Vec<_>>(), vec![1]);

        limiter.call(3);
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn test_cancel_drops_pending_call() {
        let mut event_loop = EventLoop::manual(0);
        let (calls, sink) = recorder();
        let limiter = debounce(event_loop.scheduler(), Duration::from_millis(10), false, sink);

        limiter.call(1);
        limiter.cancel();
        event_loop.advance_by(Duration::from_millis(50)).unwrap();
        assert!(calls.lock().is_empty());
        assert!(!event_loop.has_pending_work());
    }

    #[test]
    fn test_dropped_limiter_never_fires() {
        let mut event_loop = EventLoop::manual(0);
        let (calls, sink) = recorder();
        let limiter = debounce(event_loop.scheduler(), Duration::from_millis(10), false, sink);

        limiter.call(1);
        drop(limiter);
        event_loop.advance_by(Duration::from_millis(50)).unwrap();
        assert!(calls.lock().is_empty());
    }
}
