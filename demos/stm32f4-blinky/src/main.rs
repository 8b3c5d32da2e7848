// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blink-and-print demo using four protothreads.
//!
//! Two threads toggle the LED on PD12 at 7 Hz and 83 Hz; the result looks like
//! a flicker with a slow beat. Two more print status lines on USART2 (PA2, 9600
//! baud) three times a second and once a second.
//!
//! The board-independent part of the program lives in `ptos::demo`; this file
//! only supplies the pin, the console, and the tick source.

#![no_std]
#![no_main]

// Pull in a panic handling crate. We have to `extern crate` this explicitly
// because it isn't otherwise referenced in code!
extern crate panic_halt;

use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use ptos::demo::{Config, Demo};
use ptos::time::SysClock;

// Shorthand for which SoC we're targeting:
use stm32_metapac::{self as device, gpio::vals::Moder};

/// Core clock at reset (HSI).
const CLOCK_HZ: u32 = 16_000_000;
/// Tick rate. Fast enough that the 83 Hz blinker gets a whole number of ticks.
const TICK_HZ: u32 = 10_000;
const BAUD: u32 = 9_600;

const CONFIG: Config = Config::from_tick_hz(TICK_HZ);

#[cortex_m_rt::entry]
fn main() -> ! {
    // Enable clock to GPIOA, GPIOD, and USART2.
    device::RCC.ahb1enr().modify(|w| {
        w.set_gpioaen(true);
        w.set_gpioden(true);
    });
    device::RCC.apb1enr().modify(|w| w.set_usart2en(true));

    let led = RefCell::new(Led::new(device::GPIOD, 12));
    let console = RefCell::new(Console::new(device::USART2, device::GPIOA));

    let mut demo = Demo::new(SysClock, CONFIG, &led, &console)
        .with_clock_start(start_sys_tick);

    ptos::exec::run_program(&mut demo)
}

/// Starts SysTick at `TICK_HZ`. Called from the demo's `initialize` hook.
fn start_sys_tick() {
    // Safety: nothing else in this program takes the core peripherals, and
    // we only touch SYST here.
    let mut cp = unsafe { cortex_m::Peripherals::steal() };
    ptos::cortex_m_timer::initialize_sys_tick(&mut cp.SYST, CLOCK_HZ, TICK_HZ);
}

/// One push-pull output pin.
struct Led {
    port: device::gpio::Gpio,
    pin: usize,
}

impl Led {
    fn new(port: device::gpio::Gpio, pin: usize) -> Self {
        port.moder().modify(|w| w.set_moder(pin, Moder::OUTPUT));
        Self { port, pin }
    }
}

impl ErrorType for Led {
    type Error = Infallible;
}

impl OutputPin for Led {
    fn set_low(&mut self) -> Result<(), Infallible> {
        // reset bits are the top 16 of BSRR
        self.port.bsrr().write(|w| w.0 = 1 << (self.pin + 16));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.port.bsrr().write(|w| w.0 = 1 << self.pin);
        Ok(())
    }
}

impl StatefulOutputPin for Led {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.port.odr().read().0 & (1 << self.pin) != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        self.is_set_high().map(|h| !h)
    }
}

/// Transmit-only console on USART2, TX on PA2.
struct Console {
    uart: device::usart::Usart,
}

impl Console {
    fn new(uart: device::usart::Usart, gpioa: device::gpio::Gpio) -> Self {
        // PA2 to alternate function 7 (USART2_TX).
        gpioa.afr(0).modify(|w| w.set_afr(2, 7));
        gpioa.moder().modify(|w| w.set_moder(2, Moder::ALTERNATE));

        // APB1 runs at the core clock out of reset.
        uart.brr().write(|w| w.0 = CLOCK_HZ / BAUD);
        uart.cr1().write(|w| {
            w.set_te(true);
            w.set_ue(true);
        });
        Self { uart }
    }
}

impl ufmt::uWrite for Console {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        for b in s.bytes() {
            while !self.uart.sr().read().txe() {
                // spin
            }
            self.uart.dr().write(|w| w.set_dr(u16::from(b)));
        }
        Ok(())
    }
}
