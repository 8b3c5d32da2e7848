// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Threads that do something every N ticks.
//!
//! Almost every thread in a blink-and-print style program has the same shape:
//!
//! ```text
//! wait until a full period has passed since tick0
//! tick0 += PERIOD
//! do the thing
//! ```
//!
//! [`Periodic`] is that shape, written once, with the "thing" supplied as an
//! [`Action`]. Two actions come with the crate: [`Toggle`] flips an output
//! pin, and [`Report`] prints a status line. Because each `Periodic` owns its
//! own continuation marker and deadline, you can make as many as you like from
//! the same pieces -- two blinkers on two pins, or two blinkers at different
//! rates on one pin -- without any shared state between them.
//!
//! # Timing
//!
//! The deadline advances by exactly one period per firing, so the cadence
//! tracks elapsed ticks with no cumulative drift, no matter how late a given
//! firing was observed. Every `Periodic` starts measuring from tick zero
//! unless you give it a phase with [`Periodic::with_phase`]; two threads with
//! different periods otherwise free-run, and which one fires first when their
//! deadlines coincide is decided only by the order the driver calls them.

use core::cell::RefCell;

use embedded_hal::digital::StatefulOutputPin;
use ufmt::uWrite;

use crate::console;
use crate::pt::{Pt, Status, Thread};
use crate::time::{Clock, Deadline, Ticks};

/// Whether a thread keeps going after it fires.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Repeat {
    /// Go back to waiting for the next period. This is the usual choice.
    Forever,
    /// Fire once, then finish for good.
    Once,
}

/// Which wait primitive expresses the period check.
///
/// Both fire on the first check where at least one full period has elapsed;
/// this only selects whether the body is written as "wait until due" or
/// "wait while not yet due".
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Gate {
    /// `wait_until(deadline is due)`.
    Until,
    /// `wait_while(deadline is pending)`.
    While,
}

/// The side effect of a periodic thread.
pub trait Action {
    /// Called once per elapsed period, after the deadline has advanced.
    /// `tick0` is the new base of the deadline.
    fn fire(&mut self, tick0: Ticks);
}

/// A thread that performs `action` every `interval` ticks of `clock`.
#[derive(Debug)]
pub struct Periodic<C, A> {
    pt: Pt,
    deadline: Deadline,
    repeat: Repeat,
    gate: Gate,
    clock: C,
    action: A,
}

impl<C: Clock, A: Action> Periodic<C, A> {
    /// Creates a thread that fires every `interval` ticks, forever, measured
    /// from tick zero.
    pub fn new(clock: C, interval: u32, action: A) -> Self {
        Self {
            pt: Pt::new(),
            deadline: Deadline::every(interval),
            repeat: Repeat::Forever,
            gate: Gate::Until,
            clock,
            action,
        }
    }

    /// Measures the first period from `tick0` instead of tick zero.
    pub fn with_phase(mut self, tick0: Ticks) -> Self {
        self.deadline = Deadline::starting_at(tick0, self.deadline.interval());
        self
    }

    /// Chooses whether the thread repeats or fires once.
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Chooses the wait primitive used for the period check.
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    /// Returns the thread's deadline bookkeeping.
    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Borrows the action.
    pub fn action(&self) -> &A {
        &self.action
    }

    /// Checks whether this thread has reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.pt.is_finished()
    }

    fn is_due(&self) -> bool {
        self.deadline.is_due(self.clock.now())
    }

    fn is_pending(&self) -> bool {
        self.deadline.is_pending(self.clock.now())
    }

    fn fire(&mut self) {
        self.deadline.advance();
        let tick0 = self.deadline.base();
        log::trace!("periodic fired, tick0={}", tick0.get());
        self.action.fire(tick0);
    }
}

impl<C: Clock, A: Action> Thread for Periodic<C, A> {
    fn resume(&mut self) -> Status {
        let was_finished = self.pt.is_finished();
        let status = match (self.gate, self.repeat) {
            (Gate::Until, Repeat::Forever) => crate::pt!(self.pt => {
                wait_until(self.is_due());
                { self.fire(); }
                restart;
            }),
            (Gate::While, Repeat::Forever) => crate::pt!(self.pt => {
                wait_while(self.is_pending());
                { self.fire(); }
                restart;
            }),
            (Gate::Until, Repeat::Once) => crate::pt!(self.pt => {
                wait_until(self.is_due());
                { self.fire(); }
            }),
            (Gate::While, Repeat::Once) => crate::pt!(self.pt => {
                wait_while(self.is_pending());
                { self.fire(); }
            }),
        };
        if status.is_finished() && !was_finished {
            log::debug!("periodic finished at tick0={}", self.deadline.base().get());
        }
        status
    }
}

/// Flips an output pin. The pin is behind a `RefCell` so that several threads
/// can share it.
#[derive(Debug)]
pub struct Toggle<'a, P> {
    pin: &'a RefCell<P>,
}

impl<'a, P: StatefulOutputPin> Toggle<'a, P> {
    /// Creates an action that toggles `pin`.
    pub fn new(pin: &'a RefCell<P>) -> Self {
        Self { pin }
    }
}

impl<P: StatefulOutputPin> Action for Toggle<'_, P> {
    fn fire(&mut self, _tick0: Ticks) {
        if let Err(e) = self.pin.borrow_mut().toggle() {
            log::warn!("pin toggle failed: {:?}", e);
        }
    }
}

/// Prints `<label>tick0=<n>` and a line break, where `n` is the new deadline
/// base.
#[derive(Debug)]
pub struct Report<'a, W> {
    label: &'static str,
    out: &'a RefCell<W>,
}

impl<'a, W> Report<'a, W>
    where W: uWrite,
          W::Error: core::fmt::Debug,
{
    /// Creates an action that writes to `out`, starting each line with
    /// `label`.
    pub fn new(label: &'static str, out: &'a RefCell<W>) -> Self {
        Self { label, out }
    }
}

impl<W> Action for Report<'_, W>
    where W: uWrite,
          W::Error: core::fmt::Debug,
{
    fn fire(&mut self, tick0: Ticks) {
        let mut out = self.out.borrow_mut();
        console::emit(&mut *out, self.label);
        console::emit_value(&mut *out, "tick0=", tick0.get());
        console::emit_newline(&mut *out);
    }
}

/// A periodic thread that toggles a pin.
pub type Blinker<'a, C, P> = Periodic<C, Toggle<'a, P>>;

/// A periodic thread that prints a status line.
pub type Reporter<'a, C, W> = Periodic<C, Report<'a, W>>;

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embedded_hal::digital::{ErrorType, OutputPin};

    use super::*;
    use crate::time::SimClock;

    /// Records every firing.
    #[derive(Default)]
    struct Recorder(Vec<u32>);

    impl Action for Recorder {
        fn fire(&mut self, tick0: Ticks) {
            self.0.push(tick0.get());
        }
    }

    #[derive(Default)]
    struct SpyPin {
        high: bool,
        toggles: u32,
    }

    impl ErrorType for SpyPin {
        type Error = Infallible;
    }

    impl OutputPin for SpyPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    impl StatefulOutputPin for SpyPin {
        fn is_set_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_set_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }

        fn toggle(&mut self) -> Result<(), Infallible> {
            self.toggles += 1;
            self.high = !self.high;
            Ok(())
        }
    }

    struct Sink(String);

    impl uWrite for Sink {
        type Error = Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
            self.0.push_str(s);
            Ok(())
        }
    }

    fn run(t: &mut impl Thread, clock: &SimClock, ticks: u32) {
        for _ in 0..ticks {
            clock.advance(1);
            let _ = t.resume();
        }
    }

    #[test]
    fn test_deadlines_step_by_period() {
        let clock = SimClock::new();
        let mut t = Periodic::new(&clock, 4, Recorder::default());
        run(&mut t, &clock, 17);
        assert_eq!(t.action().0, [4, 8, 12, 16]);
        assert_eq!(t.deadline().base(), Ticks::from_raw(16));
    }

    #[test]
    fn test_late_polls_catch_up_without_drift() {
        let clock = SimClock::new();
        let mut t = Periodic::new(&clock, 10, Recorder::default());
        // Nobody polls until tick 35.
        clock.advance(35);
        let _ = t.resume();
        assert_eq!(t.action().0, [10]);
        for _ in 0..4 {
            let _ = t.resume();
        }
        // One firing per call, each a whole period on from the last.
        assert_eq!(t.action().0, [10, 20, 30]);
        clock.advance(5);
        let _ = t.resume();
        assert_eq!(t.action().0, [10, 20, 30, 40]);
    }

    #[test]
    fn test_gates_agree() {
        let clock = SimClock::new();
        let mut until = Periodic::new(&clock, 3, Recorder::default());
        let mut whil = Periodic::new(&clock, 3, Recorder::default())
            .with_gate(Gate::While);
        for _ in 0..20 {
            clock.advance(1);
            let _ = until.resume();
            let _ = whil.resume();
        }
        assert_eq!(until.action().0, whil.action().0);
        assert_eq!(until.action().0, [3, 6, 9, 12, 15, 18]);
    }

    #[test]
    fn test_once_fires_once_then_inert() {
        for gate in [Gate::Until, Gate::While] {
            let clock = SimClock::new();
            let mut t = Periodic::new(&clock, 5, Recorder::default())
                .with_repeat(Repeat::Once)
                .with_gate(gate);
            let mut statuses = vec![];
            for _ in 0..30 {
                clock.advance(1);
                statuses.push(t.resume());
            }
            assert_eq!(t.action().0, [5]);
            assert!(t.is_finished());
            assert!(statuses[..4].iter().all(|s| s.is_running()));
            assert!(statuses[4..].iter().all(|s| s.is_finished()));
        }
    }

    #[test]
    fn test_phase_shift() {
        let clock = SimClock::new();
        let mut t = Periodic::new(&clock, 10, Recorder::default())
            .with_phase(Ticks::from_raw(3));
        run(&mut t, &clock, 35);
        assert_eq!(t.action().0, [13, 23, 33]);
    }

    #[test]
    fn test_phase_ahead_of_clock_waits() {
        let clock = SimClock::new();
        let mut t = Periodic::new(&clock, 10, Recorder::default())
            .with_phase(Ticks::from_raw(1000));
        run(&mut t, &clock, 1009);
        assert!(t.action().0.is_empty());
        run(&mut t, &clock, 25);
        assert_eq!(t.action().0, [1010, 1020, 1030]);
    }

    #[test]
    fn test_fires_across_counter_wrap() {
        let clock = SimClock::starting_at(u32::MAX - 20);
        let mut t = Periodic::new(&clock, 8, Recorder::default())
            .with_phase(clock.now());
        run(&mut t, &clock, 40);
        let base = u32::MAX - 20;
        let expected: Vec<u32> = (1..=5)
            .map(|k| base.wrapping_add(8 * k))
            .collect();
        assert_eq!(t.action().0, expected);
    }

    #[test]
    fn test_blinker_toggles_shared_pin() {
        let clock = SimClock::new();
        let pin = RefCell::new(SpyPin::default());
        let mut a: Blinker<'_, _, _> = Periodic::new(&clock, 2, Toggle::new(&pin));
        let mut b: Blinker<'_, _, _> = Periodic::new(&clock, 5, Toggle::new(&pin));
        for _ in 0..10 {
            clock.advance(1);
            let _ = a.resume();
            let _ = b.resume();
        }
        // 5 from a, 2 from b.
        assert_eq!(pin.borrow().toggles, 7);
        assert!(pin.borrow().high);
    }

    #[test]
    fn test_reporter_prints_tick0() {
        let clock = SimClock::new();
        let out = RefCell::new(Sink(String::new()));
        let mut r: Reporter<'_, _, _> =
            Periodic::new(&clock, 100, Report::new("U2Msg Print... -> ", &out));
        run(&mut r, &clock, 250);
        assert_eq!(
            out.borrow().0,
            "U2Msg Print... -> tick0=100\r\nU2Msg Print... -> tick0=200\r\n",
        );
    }
}
