// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M SysTick as the tick source.
//!
//! **Note:** this module is only available on ARM targets with the `systick`
//! feature, which is on by default.

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use cortex_m_rt::exception;

use crate::time::Ticks;

/// Sets up the tick counter to advance `tick_hz` times per second, assuming a
/// CPU core clock of `clock_hz`.
///
/// If you use this module in your application, call this before
/// [`run_threads`][crate::exec::run_threads] (or from
/// [`Program::initialize`][crate::exec::Program::initialize]) to start the
/// clock.
///
/// `tick_hz` must be nonzero. SysTick's reload register is 24 bits wide, so
/// `clock_hz / tick_hz` must fit in 24 bits.
pub fn initialize_sys_tick(syst: &mut SYST, clock_hz: u32, tick_hz: u32) {
    let cycles_per_tick = crate::time::cycles_per_tick(clock_hz, tick_hz);
    crate::cheap_assert!(cycles_per_tick <= 1 << 24);
    syst.set_reload(cycles_per_tick - 1);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_interrupt();
    syst.enable_counter();
}

/// System tick ISR. Advances the tick counter. Threads notice on their next
/// poll.
#[doc(hidden)]
#[exception]
fn SysTick() {
    Ticks::increment();
}
