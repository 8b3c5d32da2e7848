// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resumable threads: the continuation marker and the wait primitives.
//!
//! A protothread is a routine that is called over and over, and that
//! remembers, between calls, which *wait point* it last stopped at. Each call
//! skips directly to that wait point, re-checks its condition, and either
//! suspends again or carries on to the next wait point (or the end).
//!
//! The memory cost is one [`Mark`] per thread: two bytes. There is no stack
//! switching, so local variables do not survive a suspension. Anything that
//! needs to persist across a wait point belongs in the struct that implements
//! [`Thread`].
//!
//! # Writing a thread
//!
//! The [`pt!`][crate::pt!] macro takes a place expression naming the thread's
//! [`Pt`] and a linear body made of these steps:
//!
//! - `{ ... }` -- a block of ordinary statements. It runs at most once per
//!   pass through the body; on resumption, blocks before the resumed wait
//!   point are skipped.
//! - `wait_until(cond);` -- suspend until `cond` is true. If it's already true
//!   when reached, execution continues without suspending.
//! - `wait_while(cond);` -- suspend as long as `cond` is true.
//! - `yield_now;` -- suspend once, unconditionally.
//! - `yield_until(cond);` -- suspend at least once, then until `cond` is true.
//! - `restart;` -- go back to the start of the body. The thread returns
//!   [`Status::Running`] and the next call begins at the top.
//! - `exit;` -- stop for good. The thread returns [`Status::Finished`] now
//!   and on every later call.
//!
//! Reaching the end of the body without `restart` has the same effect as
//! `exit`: the thread becomes permanently inert.
//!
//! Blocks must not `return` or `break` out of the body; doing so would skip the
//! marker bookkeeping.
//!
//! # Without the macro
//!
//! The macro only encodes a dispatch on the stored marker. Here's the same
//! thing written out for a thread with one wait point:
//!
//! ```
//! use ptos::pt::{Mark, Pt, Status, Thread};
//!
//! struct Countdown {
//!     pt: Pt,
//!     remaining: u32,
//!     fired: u32,
//! }
//!
//! const WAIT: Mark = Mark::new(1);
//!
//! impl Thread for Countdown {
//!     fn resume(&mut self) -> Status {
//!         if self.pt.is_finished() {
//!             return Status::Finished;
//!         }
//!         // Both the entry and the wait point lead to the same check here,
//!         // since nothing precedes the wait.
//!         self.remaining = self.remaining.saturating_sub(1);
//!         if self.remaining != 0 {
//!             self.pt.suspend_at(WAIT);
//!             return Status::Running;
//!         }
//!         self.fired += 1;
//!         self.pt.finish();
//!         Status::Finished
//!     }
//! }
//!
//! let mut c = Countdown { pt: Pt::new(), remaining: 3, fired: 0 };
//! assert_eq!(c.resume(), Status::Running);
//! assert_eq!(c.resume(), Status::Running);
//! assert_eq!(c.resume(), Status::Finished);
//! assert_eq!(c.resume(), Status::Finished);
//! assert_eq!(c.fired, 1);
//! ```

/// Identifies the point a thread will resume from.
///
/// [`Mark::START`] is the entry of the body, and [`Mark::END`] is the terminal
/// state. Any other value names one wait point; the [`pt!`][crate::pt!] macro
/// numbers them `1, 2, 3, ...` in body order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Mark(u16);

impl Mark {
    /// Resume at the top of the body. Threads start here.
    pub const START: Self = Self(0);
    /// The thread has finished and will do nothing more.
    pub const END: Self = Self(u16::MAX);

    /// Makes a marker for wait point `n`.
    ///
    /// `n` must not collide with [`Mark::START`] or [`Mark::END`].
    pub const fn new(n: u16) -> Self {
        Self(n)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl Default for Mark {
    fn default() -> Self {
        Self::START
    }
}

/// Result of one call to a thread.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use = "the status says whether the thread can still make progress"]
pub enum Status {
    /// The thread suspended (or restarted) and wants to be called again.
    Running,
    /// The thread reached its terminal state. Calling it again is harmless
    /// and does nothing.
    Finished,
}

impl Status {
    /// Checks whether this is `Running`.
    pub fn is_running(self) -> bool {
        self == Status::Running
    }

    /// Checks whether this is `Finished`.
    pub fn is_finished(self) -> bool {
        self == Status::Finished
    }
}

/// Continuation state of one protothread.
///
/// Keep one of these inside each struct implementing [`Thread`], and only
/// ever change it through the methods here (or through [`pt!`][crate::pt!],
/// which uses them).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Pt {
    mark: Mark,
}

impl Pt {
    /// Creates a thread state positioned at the start of the body.
    pub const fn new() -> Self {
        Self { mark: Mark::START }
    }

    /// Returns the current continuation marker.
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Checks whether the thread will begin from the top on its next call.
    pub fn at_start(&self) -> bool {
        self.mark == Mark::START
    }

    /// Checks whether the thread has reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.mark == Mark::END
    }

    /// Checks whether the thread last suspended at `mark`.
    pub fn resumes_at(&self, mark: Mark) -> bool {
        self.mark == mark
    }

    /// Records that the thread is suspending at `mark`.
    ///
    /// The caller is expected to return [`Status::Running`] right after this.
    pub fn suspend_at(&mut self, mark: Mark) {
        crate::cheap_assert!(mark != Mark::START && mark != Mark::END);
        self.mark = mark;
    }

    /// Sends the thread back to the top of its body.
    pub fn restart(&mut self) {
        self.mark = Mark::START;
    }

    /// Puts the thread in its terminal state.
    pub fn finish(&mut self) {
        self.mark = Mark::END;
    }

    /// Re-arms the thread from the top, even if it had finished.
    ///
    /// The driver never does this; it's for applications that want to revive
    /// a thread that exited.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// A resumable task.
///
/// `resume` is called once per driver pass. It should run until the next wait
/// point that can't proceed (or to the end of its body) and report whether it
/// is still running.
pub trait Thread {
    /// Gives the thread a chance to make progress.
    fn resume(&mut self) -> Status;
}

impl<T: Thread + ?Sized> Thread for &mut T {
    fn resume(&mut self) -> Status {
        (**self).resume()
    }
}

/// Wraps a closure as a [`Thread`].
///
/// Handy for small glue threads; the closure is responsible for its own
/// continuation state.
pub fn from_fn<F>(f: F) -> FromFn<F>
    where F: FnMut() -> Status,
{
    FromFn(f)
}

/// Thread made from a closure (result of [`from_fn`]).
pub struct FromFn<F>(F);

impl<F> Thread for FromFn<F>
    where F: FnMut() -> Status,
{
    fn resume(&mut self) -> Status {
        (self.0)()
    }
}

impl<F> core::fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("FromFn")
    }
}

/// Runs one call of a protothread body.
///
/// `pt!(place => { steps })` evaluates to a [`Status`]. `place` must be a
/// place expression of type [`Pt`] (usually `self.pt`); it's re-evaluated at
/// each step, so blocks are free to use other fields of `self`.
///
/// See the [module docs][crate::pt] for the list of steps.
///
/// ```
/// use ptos::pt::{Pt, Status};
///
/// let mut pt = Pt::new();
/// let mut ready = false;
/// let mut log = [0u8; 4];
/// let mut n = 0;
///
/// let mut step = |pt: &mut Pt, ready: bool, log: &mut [u8; 4], n: &mut usize| {
///     ptos::pt!(*pt => {
///         { log[*n] = b'a'; *n += 1; }
///         wait_until(ready);
///         { log[*n] = b'b'; *n += 1; }
///     })
/// };
///
/// assert_eq!(step(&mut pt, ready, &mut log, &mut n), Status::Running);
/// assert_eq!(step(&mut pt, ready, &mut log, &mut n), Status::Running);
/// ready = true;
/// assert_eq!(step(&mut pt, ready, &mut log, &mut n), Status::Finished);
/// assert_eq!(step(&mut pt, ready, &mut log, &mut n), Status::Finished);
/// assert_eq!(&log[..n], b"ab");
/// ```
#[macro_export]
macro_rules! pt {
    ($pt:expr => { $($body:tt)* }) => {{
        #[allow(unused_assignments, unused_mut, unreachable_code)]
        let status = 'pt: {
            if $crate::pt::Pt::is_finished(&$pt) {
                break 'pt $crate::pt::Status::Finished;
            }
            let mut live = $crate::pt::Pt::at_start(&$pt);
            $crate::__pt_steps!(($pt) live 'pt (1u16) $($body)*);
        };
        status
    }};
}

/// Implementation detail of [`pt!`]: walks the body one step at a time,
/// numbering wait points as it goes.
#[doc(hidden)]
#[macro_export]
macro_rules! __pt_steps {
    // End of body: terminal.
    (($pt:expr) $live:ident $out:lifetime ($n:expr)) => {
        $crate::pt::Pt::finish(&mut $pt);
        break $out $crate::pt::Status::Finished;
    };

    (($pt:expr) $live:ident $out:lifetime ($n:expr)
        wait_until($cond:expr); $($rest:tt)*) => {
        if $live || $crate::pt::Pt::resumes_at(&$pt, $crate::pt::Mark::new($n)) {
            $live = true;
            if !($cond) {
                $crate::pt::Pt::suspend_at(&mut $pt, $crate::pt::Mark::new($n));
                break $out $crate::pt::Status::Running;
            }
        }
        $crate::__pt_steps!(($pt) $live $out ($n + 1u16) $($rest)*);
    };

    (($pt:expr) $live:ident $out:lifetime ($n:expr)
        wait_while($cond:expr); $($rest:tt)*) => {
        $crate::__pt_steps!(($pt) $live $out ($n)
            wait_until(!($cond)); $($rest)*);
    };

    (($pt:expr) $live:ident $out:lifetime ($n:expr)
        yield_now; $($rest:tt)*) => {
        if $live {
            $crate::pt::Pt::suspend_at(&mut $pt, $crate::pt::Mark::new($n));
            break $out $crate::pt::Status::Running;
        }
        if $crate::pt::Pt::resumes_at(&$pt, $crate::pt::Mark::new($n)) {
            $live = true;
        }
        $crate::__pt_steps!(($pt) $live $out ($n + 1u16) $($rest)*);
    };

    (($pt:expr) $live:ident $out:lifetime ($n:expr)
        yield_until($cond:expr); $($rest:tt)*) => {
        if $live {
            $crate::pt::Pt::suspend_at(&mut $pt, $crate::pt::Mark::new($n));
            break $out $crate::pt::Status::Running;
        }
        if $crate::pt::Pt::resumes_at(&$pt, $crate::pt::Mark::new($n)) {
            $live = true;
            if !($cond) {
                break $out $crate::pt::Status::Running;
            }
        }
        $crate::__pt_steps!(($pt) $live $out ($n + 1u16) $($rest)*);
    };

    (($pt:expr) $live:ident $out:lifetime ($n:expr)
        restart; $($rest:tt)*) => {
        if $live {
            $crate::pt::Pt::restart(&mut $pt);
            break $out $crate::pt::Status::Running;
        }
        $crate::__pt_steps!(($pt) $live $out ($n) $($rest)*);
    };

    (($pt:expr) $live:ident $out:lifetime ($n:expr)
        exit; $($rest:tt)*) => {
        if $live {
            $crate::pt::Pt::finish(&mut $pt);
            break $out $crate::pt::Status::Finished;
        }
        $crate::__pt_steps!(($pt) $live $out ($n) $($rest)*);
    };

    (($pt:expr) $live:ident $out:lifetime ($n:expr)
        { $($stmts:tt)* } $($rest:tt)*) => {
        if $live {
            $($stmts)*
        }
        $crate::__pt_steps!(($pt) $live $out ($n) $($rest)*);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A thread that records every action it takes, with two wait points.
    struct TwoStep {
        pt: Pt,
        gate_a: bool,
        gate_b: bool,
        trace: Vec<&'static str>,
    }

    impl TwoStep {
        fn new() -> Self {
            Self { pt: Pt::new(), gate_a: false, gate_b: false, trace: vec![] }
        }
    }

    impl Thread for TwoStep {
        fn resume(&mut self) -> Status {
            crate::pt!(self.pt => {
                { self.trace.push("entry"); }
                wait_until(self.gate_a);
                { self.trace.push("after a"); }
                wait_while(!self.gate_b);
                { self.trace.push("after b"); }
            })
        }
    }

    #[test]
    fn test_new_is_at_start() {
        let pt = Pt::new();
        assert!(pt.at_start());
        assert!(!pt.is_finished());
        assert_eq!(pt.mark(), Mark::START);
        assert_eq!(Pt::default(), pt);
    }

    #[test]
    fn test_statements_before_wait_run_once() {
        let mut t = TwoStep::new();
        for _ in 0..5 {
            assert_eq!(t.resume(), Status::Running);
        }
        assert_eq!(t.trace, ["entry"]);
        assert_eq!(t.pt.mark(), Mark::new(1));
    }

    #[test]
    fn test_resumes_at_later_wait_point() {
        let mut t = TwoStep::new();
        assert_eq!(t.resume(), Status::Running);
        t.gate_a = true;
        assert_eq!(t.resume(), Status::Running);
        assert_eq!(t.pt.mark(), Mark::new(2));
        // Closing gate a again must not matter; we're past it.
        t.gate_a = false;
        assert_eq!(t.resume(), Status::Running);
        assert_eq!(t.trace, ["entry", "after a"]);

        t.gate_b = true;
        assert_eq!(t.resume(), Status::Finished);
        assert_eq!(t.trace, ["entry", "after a", "after b"]);
    }

    #[test]
    fn test_satisfied_waits_do_not_yield() {
        let mut t = TwoStep::new();
        t.gate_a = true;
        t.gate_b = true;
        assert_eq!(t.resume(), Status::Finished);
        assert_eq!(t.trace, ["entry", "after a", "after b"]);
    }

    #[test]
    fn test_finished_is_idempotent() {
        let mut t = TwoStep::new();
        t.gate_a = true;
        t.gate_b = true;
        assert_eq!(t.resume(), Status::Finished);
        for _ in 0..10 {
            assert_eq!(t.resume(), Status::Finished);
        }
        assert_eq!(t.trace.len(), 3);
        assert!(t.pt.is_finished());
    }

    #[test]
    fn test_reset_revives_finished_thread() {
        let mut t = TwoStep::new();
        t.gate_a = true;
        t.gate_b = true;
        assert_eq!(t.resume(), Status::Finished);
        t.pt.reset();
        assert_eq!(t.resume(), Status::Finished);
        assert_eq!(t.trace.len(), 6);
    }

    struct Looper {
        pt: Pt,
        ready: bool,
        count: u32,
    }

    impl Thread for Looper {
        fn resume(&mut self) -> Status {
            crate::pt!(self.pt => {
                wait_until(self.ready);
                { self.count += 1; }
                restart;
            })
        }
    }

    #[test]
    fn test_restart_returns_and_loops() {
        let mut t = Looper { pt: Pt::new(), ready: true, count: 0 };
        // One action per call even though the condition stays true.
        for i in 1..=4 {
            assert_eq!(t.resume(), Status::Running);
            assert_eq!(t.count, i);
            assert!(t.pt.at_start());
        }
        t.ready = false;
        assert_eq!(t.resume(), Status::Running);
        assert_eq!(t.count, 4);
    }

    struct Yielder {
        pt: Pt,
        trace: Vec<u8>,
        cond: bool,
    }

    impl Thread for Yielder {
        fn resume(&mut self) -> Status {
            crate::pt!(self.pt => {
                { self.trace.push(1); }
                yield_now;
                { self.trace.push(2); }
                yield_until(self.cond);
                { self.trace.push(3); }
                exit;
                { self.trace.push(99); }
            })
        }
    }

    #[test]
    fn test_yield_variants_and_exit() {
        let mut t = Yielder { pt: Pt::new(), trace: vec![], cond: true };
        assert_eq!(t.resume(), Status::Running);
        assert_eq!(t.trace, [1]);
        // yield_until suspends once even though cond is already true.
        assert_eq!(t.resume(), Status::Running);
        assert_eq!(t.trace, [1, 2]);
        t.cond = false;
        assert_eq!(t.resume(), Status::Running);
        assert_eq!(t.resume(), Status::Running);
        assert_eq!(t.trace, [1, 2]);
        t.cond = true;
        assert_eq!(t.resume(), Status::Finished);
        assert_eq!(t.trace, [1, 2, 3]);
        assert_eq!(t.resume(), Status::Finished);
        assert_eq!(t.trace, [1, 2, 3]);
    }

    #[test]
    fn test_from_fn_thread() {
        let mut calls = 0;
        {
            let mut t = from_fn(|| {
                calls += 1;
                if calls < 3 { Status::Running } else { Status::Finished }
            });
            assert!(t.resume().is_running());
            assert!(t.resume().is_running());
            assert!(t.resume().is_finished());
        }
        assert_eq!(calls, 3);
    }
}
