//! Millisecond tick counter
//!
//! A periodic timer interrupt is the only writer; every other context reads.
//! The counter wraps at `u32::MAX`, so ages must always go through [`elapsed`].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One tick of the system clock (1 ms on the reference board)
pub type Tick = u32;

/// Wraparound-safe age of `since` as seen at `now`
#[inline]
pub fn elapsed(now: Tick, since: Tick) -> Tick {
    now.wrapping_sub(since)
}

/// Monotonic tick counter shared between the timer ISR and the task loop
pub struct TickCounter {
    ticks: AtomicU32,
    driver_taken: AtomicBool,
}

impl TickCounter {
    /// Create a counter starting at zero
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a counter starting at `tick` (used to exercise wraparound)
    pub const fn starting_at(tick: Tick) -> Self {
        Self {
            ticks: AtomicU32::new(tick),
            driver_taken: AtomicBool::new(false),
        }
    }

    /// Current tick
    #[inline]
    pub fn now(&self) -> Tick {
        self.ticks.load(Ordering::Acquire)
    }

    /// Take the single writer handle. Returns `None` if it was already taken.
    pub fn take_driver(&self) -> Option<TickDriver<'_>> {
        if self.driver_taken.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(TickDriver { counter: self })
        }
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer handle for the tick counter; owned by the timer interrupt
pub struct TickDriver<'a> {
    counter: &'a TickCounter,
}

impl TickDriver<'_> {
    /// Advance by one tick (called from the timer interrupt)
    #[inline]
    pub fn advance(&mut self) -> Tick {
        self.advance_by(1)
    }

    /// Advance by `ticks` at once
    #[inline]
    pub fn advance_by(&mut self, ticks: Tick) -> Tick {
        // Single writer: a plain load/store pair is enough and keeps this
        // usable on cores without read-modify-write atomics.
        let next = self.counter.ticks.load(Ordering::Relaxed).wrapping_add(ticks);
        self.counter.ticks.store(next, Ordering::Release);
        next
    }

    /// Current tick
    pub fn now(&self) -> Tick {
        self.counter.now()
    }
}
