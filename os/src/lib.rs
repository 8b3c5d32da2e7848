// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A tiny cooperative multitasking core built from protothreads.
//!
//! This provides the minimum needed to run several periodic activities
//! (blinking a pin, printing a status line, polling a sensor) on one execution
//! thread, with no preemption, no per-task stacks, and no dynamic memory.
//!
//! # `ptos` design principles
//!
//! 1. Be compact. Each task carries a two-byte continuation marker plus
//!    whatever state it chooses to keep. There is no heap and no per-task
//!    stack.
//!
//! 2. No magic. The [`pt!`] macro is shorthand for a `match`-like dispatch on
//!    the continuation marker. Everything it does can be written by hand using
//!    the [`Pt`][pt::Pt] API, and the docs on that type show how.
//!
//! 3. Be predictable. The driver in [`exec`] calls every task exactly once per
//!    pass, in the order you gave them, forever. There is no priority, no
//!    skipping, and no hidden wakeup bookkeeping.
//!
//! # About the model
//!
//! A *thread* in this crate is an ordinary struct implementing
//! [`Thread`][pt::Thread]. Every call to [`Thread::resume`][pt::Thread::resume]
//! re-enters the thread's body from the top; the stored continuation marker
//! tells the body which wait point it last suspended at, so it can skip
//! straight there instead of re-running earlier statements.
//!
//! Waiting never blocks. A wait point evaluates its condition, and if the
//! thread can't proceed, records where it is and returns. The driver moves on
//! to the next thread and will offer this one another chance on the next pass.
//!
//! Here is the "hello world" of embedded programming, written as a thread:
//!
//! ```
//! use core::cell::Cell;
//! use ptos::pt::{Pt, Status, Thread};
//! use ptos::time::{Clock, Deadline, SimClock};
//!
//! struct Blink<'a> {
//!     pt: Pt,
//!     deadline: Deadline,
//!     clock: &'a SimClock,
//!     led: &'a Cell<bool>,
//! }
//!
//! impl Thread for Blink<'_> {
//!     fn resume(&mut self) -> Status {
//!         ptos::pt!(self.pt => {
//!             wait_until(self.deadline.is_due(self.clock.now()));
//!             {
//!                 self.deadline.advance();
//!                 self.led.set(!self.led.get());
//!             }
//!             restart;
//!         })
//!     }
//! }
//!
//! let clock = SimClock::new();
//! let led = Cell::new(false);
//! let mut blink = Blink {
//!     pt: Pt::new(),
//!     deadline: Deadline::every(10),
//!     clock: &clock,
//!     led: &led,
//! };
//!
//! for _ in 0..25 {
//!     clock.advance(1);
//!     ptos::exec::run_once(&mut [&mut blink]);
//! }
//! // Toggled at ticks 10 and 20.
//! assert!(!led.get());
//! ```
//!
//! # Concurrency and interrupts
//!
//! Only one thread body runs at a time, and it runs until it reaches a wait
//! point or the end of its body. The only state shared with interrupt context
//! is the tick counter in [`time`], which is a single atomic word, so an ISR
//! advancing it can never be observed half-written.

#![cfg_attr(not(test), no_std)]

#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications,
)]

/// Internal assert macro that doesn't stringify its expression or generate any
/// fancy messages. This means failures must be diagnosed by file:line only, so,
/// don't use this more than once on the same line. In exchange, this makes
/// asserts significantly smaller in terms of text size.
macro_rules! cheap_assert {
    ($x:expr) => {
        if !$x { panic!(); };
    }
}
pub(crate) use cheap_assert;

#[macro_use]
pub mod pt;
pub mod exec;
pub mod time;
pub mod console;
pub mod periodic;
pub mod demo;

#[cfg(all(target_arch = "arm", feature = "systick"))]
pub mod cortex_m_timer;
