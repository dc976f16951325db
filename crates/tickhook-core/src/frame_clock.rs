#![forbid(unsafe_code)]

//! Frame clock: the per-tick heartbeat of the pipeline.
//!
//! The host's simulation step is intercepted once per frame and forwarded to
//! [`FrameClock::on_tick`], which increments the monotone tick counter and
//! then dispatches every registered observer in registration order, passing
//! the new tick value.
//!
//! # Failure isolation
//!
//! An observer that panics is caught, logged under its registered name, and
//! left installed. A single bad tick must never disable an observability
//! hook, and must never prevent later observers from running - the host is
//! driving this call and must not be destabilized.
//!
//! # Threading
//!
//! Single-threaded by contract: the host calls the tick entry point from
//! exactly one thread, never reentrantly. There is no locking here.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

/// One discrete simulation step of the host process.
///
/// Unsigned, monotonically increasing, incremented exactly once per
/// intercepted simulation call. Never resets for the process lifetime.
pub type Tick = u64;

struct Observer {
    name: &'static str,
    f: Box<dyn FnMut(Tick)>,
}

/// Monotone tick counter plus per-tick observer dispatch.
pub struct FrameClock {
    tick: Tick,
    observers: Vec<Observer>,
}

impl FrameClock {
    /// Create a clock at tick 0. The first [`on_tick`](Self::on_tick)
    /// dispatches tick 1; a zero tick is never observed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick: 0,
            observers: Vec::new(),
        }
    }

    /// The most recently dispatched tick (0 before the first step).
    #[must_use]
    pub const fn current(&self) -> Tick {
        self.tick
    }

    /// Register an observer, invoked once per tick in registration order.
    ///
    /// Observers must not block and must not allocate unbounded memory; they
    /// run synchronously inside the host's simulation thread. The `name` is
    /// used when reporting an isolated failure.
    pub fn register(&mut self, name: &'static str, f: impl FnMut(Tick) + 'static) {
        self.observers.push(Observer {
            name,
            f: Box::new(f),
        });
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Advance the clock by one tick and dispatch all observers.
    ///
    /// Called exactly once per intercepted simulation step. Returns the new
    /// tick value. A panicking observer is caught and logged; it stays
    /// installed and later observers still run, this tick and every tick
    /// after.
    pub fn on_tick(&mut self) -> Tick {
        self.tick += 1;
        let tick = self.tick;
        for obs in &mut self.observers {
            if catch_unwind(AssertUnwindSafe(|| (obs.f)(tick))).is_err() {
                warn!(observer = obs.name, tick, "tick observer panicked; continuing");
            }
        }
        tick
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClock")
            .field("tick", &self.tick)
            .field("observers", &self.observers.len())
            .finish()
    }
}
