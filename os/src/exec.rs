// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The round-robin driver.
//!
//! **Note:** for our purposes, a _thread_ is a protothread: a struct
//! implementing [`Thread`] that gets called over and over. There is a fixed
//! set of threads, provided to the driver at startup, and the order you list
//! them in is the order they run in.
//!
//!
//! # Starting the driver
//!
//! The mechanism for "starting the OS" is [`run_threads`]. It never returns.
//! Each pass through its loop calls every thread exactly once, in slice
//! order, whether or not the previous thread made progress. A thread that has
//! finished is still called; it just returns immediately.
//!
//! If you'd rather own the outer loop yourself -- for instance, because your
//! board support code already has an Arduino-style `setup`/`loop` split --
//! call [`run_once`] from it, or implement [`Program`] and hand it to
//! [`run_program`].
//!
//!
//! # Busy polling and idle
//!
//! The driver doesn't know when a thread will next be able to proceed. It
//! doesn't track deadlines or wake bits; it just keeps asking. That keeps the
//! CPU running full-tilt, which is the simplest thing that is always correct.
//!
//! If you want to save power, [`run_threads_with_idle`] calls a hook of your
//! choosing after each pass. The hook must return at least as often as the
//! tick counter advances, or threads waiting on elapsed time will fire late.
//! On Cortex-M with SysTick as the tick source, [`wait_for_interrupt`] (a
//! `WFI`) meets that requirement, because the tick interrupt itself wakes the
//! processor. A thread that uses `yield_now` wants to run again immediately,
//! though, so only idle if none of your threads do that.
//!
//!
//! # Fault isolation
//!
//! A thread whose condition can never become true -- say, it's waiting on a
//! counter that has stopped -- just never fires again. It keeps returning
//! [`Status::Running`][crate::pt::Status::Running], and the driver keeps
//! calling it and everything after it. Nothing is reported; the only symptom
//! is the missing side effect.

use crate::pt::Thread;

/// Gives each thread in `threads` one chance to run, in order.
///
/// Returns the number of threads that reported they are still running. The
/// driver itself never looks at that; it's there for callers who want to
/// know when everything has finished.
pub fn run_once(threads: &mut [&mut dyn Thread]) -> usize {
    let mut running = 0;
    for t in threads.iter_mut() {
        if t.resume().is_running() {
            running += 1;
        }
    }
    running
}

/// Runs the given threads forever, busy-polling.
///
/// This is the outermost loop of a program. It never sleeps, never blocks,
/// and never returns.
pub fn run_threads(threads: &mut [&mut dyn Thread]) -> ! {
    log::debug!("running {} threads", threads.len());
    loop {
        run_once(threads);
    }
}

/// One pass of [`run_threads_with_idle`]: calls every thread once, then
/// `idle_hook` once, whatever the threads reported.
///
/// Returns the number of threads still running, as [`run_once`] does.
pub fn run_pass_with_idle(
    threads: &mut [&mut dyn Thread],
    idle_hook: &mut impl FnMut(),
) -> usize {
    let running = run_once(threads);
    idle_hook();
    running
}

/// Runs the given threads forever, calling `idle_hook` after every pass.
///
/// See the [module docs][crate::exec] for the constraints on the hook.
pub fn run_threads_with_idle(
    threads: &mut [&mut dyn Thread],
    mut idle_hook: impl FnMut(),
) -> ! {
    log::debug!("running {} threads with idle hook", threads.len());
    loop {
        run_pass_with_idle(threads, &mut idle_hook);
    }
}

/// Idles the processor until the next interrupt, where the platform can do
/// that, or spins briefly where it can't.
pub fn wait_for_interrupt() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "arm")] {
            cortex_m::asm::wfi();
        } else {
            core::hint::spin_loop();
        }
    }
}

/// The contract between a program built on this crate and its host.
///
/// A host (a `main` function, or a vendor runtime that owns `main`) calls
/// [`initialize`][Program::initialize] once, and then
/// [`run_once`][Program::run_once] forever.
pub trait Program {
    /// Configures actuators and output channels and starts whatever advances
    /// the tick counter. Called once.
    fn initialize(&mut self);

    /// Performs exactly one round-robin pass over the program's threads.
    fn run_once(&mut self);
}

/// Initializes `program` and then runs it forever.
pub fn run_program(program: &mut impl Program) -> ! {
    program.initialize();
    log::debug!("initialized, entering driver loop");
    loop {
        program.run_once();
    }
}
