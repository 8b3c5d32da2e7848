// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timekeeping with a free-running, wrapping tick counter.
//!
//! The OS keeps a 32-bit count of "ticks" that some external source (usually a
//! timer interrupt) advances at a fixed rate. On Cortex-M with the `systick`
//! feature, [`initialize_sys_tick`][crate::cortex_m_timer::initialize_sys_tick]
//! sets that up for you. On other platforms, arrange for [`Ticks::increment`]
//! to be called from whatever timer ISR you have, or implement [`Clock`]
//! yourself.
//!
//! You can get the value of the tick counter using [`Ticks::now`].
//!
//! # Wraparound
//!
//! Unlike a 64-bit millisecond counter, a 32-bit counter running at CPU clock
//! rates wraps in minutes. Code in this crate never compares two tick values
//! with `<` or `>`. Instead it asks how far one is past another, using
//! wrapping subtraction ([`Ticks::wrapping_since`]). That gives the right
//! answer across a single wrap, as long as the interval being measured is
//! shorter than the full counter range.
//!
//! # Periodic deadlines
//!
//! [`Deadline`] is the bookkeeping for "do this every N ticks". It advances by
//! exactly one period each time it fires, rather than being reset to the
//! current time, so a thread that is polled late doesn't accumulate drift.

use core::cell::Cell;
use portable_atomic::{AtomicU32, Ordering};

/// The tick counter. Updated by ISR.
static TICK: AtomicU32 = AtomicU32::new(0);

/// Represents a moment in time by the value of the tick counter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Ticks(u32);

impl Ticks {
    /// Tick zero, where every counter starts.
    pub const ZERO: Self = Self(0);

    /// Retrieves the current value of the global tick counter.
    ///
    /// The counter is a single atomic word, so this never observes a
    /// partially-updated value, even if the tick ISR preempts the read.
    pub fn now() -> Self {
        Self(TICK.load(Ordering::Acquire))
    }

    /// Advances the global tick counter by one, wrapping at `u32::MAX`.
    ///
    /// Call this from the ISR of whatever timer drives the clock.
    pub fn increment() {
        TICK.fetch_add(1, Ordering::Release);
    }

    /// Makes a `Ticks` from a raw counter value.
    pub const fn from_raw(t: u32) -> Self {
        Self(t)
    }

    /// Returns the raw counter value.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Computes how many ticks `self` is past `earlier`, modulo 2^32.
    ///
    /// If `self` was reached by counting forward from `earlier` (even across a
    /// wrap), this is the elapsed time.
    pub const fn wrapping_since(self, earlier: Ticks) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Adds some ticks, wrapping at the counter width.
    pub const fn wrapping_add(self, ticks: u32) -> Self {
        Self(self.0.wrapping_add(ticks))
    }
}

impl From<Ticks> for u32 {
    fn from(t: Ticks) -> Self {
        t.0
    }
}

impl From<u32> for Ticks {
    fn from(t: u32) -> Self {
        Self(t)
    }
}

/// A source of the current tick count.
///
/// This is the one collaborator every timed thread needs. The OS provides
/// [`SysClock`] for the global counter and [`SimClock`] for simulation.
pub trait Clock {
    /// Reads the current tick count.
    fn now(&self) -> Ticks;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Ticks {
        (**self).now()
    }
}

/// Reads the global tick counter maintained by [`Ticks::increment`].
#[derive(Copy, Clone, Debug, Default)]
pub struct SysClock;

impl Clock for SysClock {
    fn now(&self) -> Ticks {
        Ticks::now()
    }
}

/// A clock that only moves when told to.
///
/// Useful for running threads in simulation -- including in tests -- where
/// you want exact control over how many ticks pass between driver passes.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<u32>,
}

impl SimClock {
    /// Creates a clock reading tick zero.
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a clock reading `t`.
    pub const fn starting_at(t: u32) -> Self {
        Self { now: Cell::new(t) }
    }

    /// Moves the clock forward by `ticks`, wrapping at the counter width.
    pub fn advance(&self, ticks: u32) {
        self.now.set(self.now.get().wrapping_add(ticks));
    }

    /// Sets the clock to `t`.
    pub fn set(&self, t: Ticks) {
        self.now.set(t.get());
    }
}

impl Clock for SimClock {
    fn now(&self) -> Ticks {
        Ticks(self.now.get())
    }
}

/// Number of timer input cycles per tick, for a timer clocked at `clock_hz`
/// that should interrupt `tick_hz` times a second.
///
/// Panics if `tick_hz` is zero or faster than `clock_hz`.
pub const fn cycles_per_tick(clock_hz: u32, tick_hz: u32) -> u32 {
    crate::cheap_assert!(tick_hz != 0);
    let cycles = clock_hz / tick_hz;
    crate::cheap_assert!(cycles != 0);
    cycles
}

/// Helper for doing something periodically, accurately.
///
/// A `Deadline` records the tick its current period is measured from (its
/// *base*) and the period length. It is *due* once at least one full period
/// has elapsed since the base. Firing moves the base forward by exactly one
/// period:
///
/// ```
/// use ptos::time::{Deadline, Ticks};
///
/// let mut d = Deadline::every(30);
/// assert!(!d.is_due(Ticks::from_raw(29)));
/// // Polled late, at tick 41...
/// assert!(d.is_due(Ticks::from_raw(41)));
/// d.advance();
/// // ...but the next period is still measured from 30, not 41.
/// assert_eq!(d.base(), Ticks::from_raw(30));
/// assert!(d.is_due(Ticks::from_raw(60)));
/// ```
///
/// This maintains a constant number of firings per unit time. It has
/// "catch-up" behavior that might not be what you want: if a thread is
/// starved for five periods, it will be due five times in a row as soon as
/// it's polled again.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Deadline {
    interval: u32,
    base: Ticks,
}

impl Deadline {
    /// Creates a deadline that first falls due `interval` ticks after tick
    /// zero.
    pub const fn every(interval: u32) -> Self {
        Self::starting_at(Ticks::ZERO, interval)
    }

    /// Creates a deadline that first falls due `interval` ticks after `base`.
    ///
    /// This can be useful for creating multiple deadlines that operate out of
    /// phase with respect to each other. `base` may be ahead of the clock.
    ///
    /// `interval` must be nonzero and below 2^31.
    pub const fn starting_at(base: Ticks, interval: u32) -> Self {
        crate::cheap_assert!(interval != 0 && interval <= i32::MAX as u32);
        Self { interval, base }
    }

    /// Returns the period length in ticks.
    pub const fn interval(&self) -> u32 {
        self.interval
    }

    /// Returns the tick the current period is measured from.
    pub const fn base(&self) -> Ticks {
        self.base
    }

    /// Returns the tick at which the deadline falls due.
    pub const fn next(&self) -> Ticks {
        self.base.wrapping_add(self.interval)
    }

    /// Checks whether `now` has reached [`next`][Self::next].
    ///
    /// The comparison is made on the signed distance from `next` to `now`, so
    /// it survives the counter wrapping. A base set ahead of the clock is
    /// simply not due yet. The flip side is that a deadline left unpolled for
    /// more than 2^31 ticks looks like it is in the future again.
    pub fn is_due(&self, now: Ticks) -> bool {
        (now.wrapping_since(self.next()) as i32) >= 0
    }

    /// Checks whether the deadline is still in the future at time `now`. This
    /// is the negation of [`is_due`][Self::is_due], for `wait_while` bodies.
    pub fn is_pending(&self, now: Ticks) -> bool {
        !self.is_due(now)
    }

    /// Moves the base forward by exactly one period.
    pub fn advance(&mut self) {
        self.base = self.base.wrapping_add(self.interval);
    }
}
