// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The four-thread demo program, independent of any particular board.
//!
//! Two threads blink one LED at two unrelated rates, and two more print status
//! lines to a console at two slower rates. Board crates supply the pin, the
//! console, and the clock, then hand a [`Demo`] to
//! [`run_program`][crate::exec::run_program].

use core::cell::RefCell;

use embedded_hal::digital::StatefulOutputPin;
use ufmt::uWrite;

use crate::console;
use crate::exec::{self, Program};
use crate::periodic::{Blinker, Gate, Periodic, Report, Reporter, Toggle};
use crate::pt::Thread;
use crate::time::Clock;

/// Thread periods, in ticks.
///
/// All four are derived from the tick rate, so the same program runs at the
/// same wall-clock speed on any board once `tick_hz` is right.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Rate the tick counter advances at.
    pub tick_hz: u32,
    /// First blinker: 7 toggles per second.
    pub led1_period: u32,
    /// Second blinker: 83 toggles per second, same LED.
    pub led2_period: u32,
    /// First reporter: three lines per second.
    pub u2_period: u32,
    /// Second reporter: one line per second.
    pub u3_period: u32,
}

impl Config {
    /// Derives the demo's periods from the tick rate.
    ///
    /// `tick_hz` must be at least 83, or the fastest period rounds to zero.
    pub const fn from_tick_hz(tick_hz: u32) -> Self {
        crate::cheap_assert!(tick_hz >= 83);
        Self {
            tick_hz,
            led1_period: tick_hz / 7,
            led2_period: tick_hz / 83,
            u2_period: tick_hz / 3,
            u3_period: tick_hz,
        }
    }
}

/// The demo program: one pin, one console, four threads.
#[derive(Debug)]
pub struct Demo<'a, C, P, W> {
    config: Config,
    pin: &'a RefCell<P>,
    out: &'a RefCell<W>,
    start_clock: fn(),
    led1: Blinker<'a, C, P>,
    led2: Blinker<'a, C, P>,
    u2: Reporter<'a, C, W>,
    u3: Reporter<'a, C, W>,
}

impl<'a, C, P, W> Demo<'a, C, P, W>
    where C: Clock + Copy,
          P: StatefulOutputPin,
          W: uWrite,
          W::Error: core::fmt::Debug,
{
    /// Builds the demo's threads around `pin` and `out`.
    pub fn new(
        clock: C,
        config: Config,
        pin: &'a RefCell<P>,
        out: &'a RefCell<W>,
    ) -> Self {
        Self {
            config,
            pin,
            out,
            start_clock: || (),
            led1: Periodic::new(clock, config.led1_period, Toggle::new(pin)),
            led2: Periodic::new(clock, config.led2_period, Toggle::new(pin)),
            u2: Periodic::new(
                clock,
                config.u2_period,
                Report::new("U2Msg Print... -> ", out),
            ),
            u3: Periodic::new(
                clock,
                config.u3_period,
                Report::new("U3Msg Print... -> ", out),
            )
            .with_gate(Gate::While),
        }
    }

    /// Sets the function [`initialize`][Program::initialize] calls to start
    /// the tick source (for example, enabling the timer interrupt).
    pub fn with_clock_start(mut self, start_clock: fn()) -> Self {
        self.start_clock = start_clock;
        self
    }

    /// Returns the configuration the demo was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lists the threads in driver order.
    pub fn threads(&mut self) -> [&mut dyn Thread; 4] {
        [&mut self.led1, &mut self.led2, &mut self.u2, &mut self.u3]
    }
}

impl<C, P, W> Program for Demo<'_, C, P, W>
    where C: Clock + Copy,
          P: StatefulOutputPin,
          W: uWrite,
          W::Error: core::fmt::Debug,
{
    fn initialize(&mut self) {
        if let Err(e) = self.pin.borrow_mut().set_low() {
            log::warn!("could not drive LED low: {:?}", e);
        }
        {
            let mut out = self.out.borrow_mut();
            console::emit_value(&mut *out, "ptos demo, tick_hz=", self.config.tick_hz);
            console::emit_newline(&mut *out);
        }
        (self.start_clock)();
        log::info!("demo initialized");
    }

    fn run_once(&mut self) {
        exec::run_once(&mut self.threads());
    }
}
