//! Cooperative host runtime for the diagnostics layer.
//!
//! This crate provides the single-threaded event loop the interceptors run on:
//! - Clocks (system and manual)
//! - Timer and microtask queues
//! - Rate-limited callbacks (throttle/debounce)
//! - Subscriber lists with panic isolation
//! - A named-channel event bus

pub mod clock;
pub mod event_loop;
pub mod events;
pub mod listeners;
pub mod runtime;
pub mod throttle;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event_loop::EventLoop;
pub use events::{EventBus, EventHandler, HandlerId, CLEAR};
pub use listeners::{Listener, ListenerSet};
pub use runtime::{Runtime, Scheduler, TimerCallback, TimerId};
pub use throttle::{debounce, LimitMode, RateLimiter};
