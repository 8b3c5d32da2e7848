// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fire-and-forget text output.
//!
//! Threads that print status lines go through these helpers rather than
//! talking to a UART directly. The sink is anything implementing
//! [`ufmt::uWrite`], which keeps number formatting small enough for a
//! microcontroller.
//!
//! None of these report failure to the caller. A sink that can't accept the
//! text (a full buffer, a disconnected transport) is the sink's problem; the
//! error is logged and dropped so that a misbehaving console can't stall the
//! thread that was printing.

use ufmt::{uWrite, uwrite};

/// Writes `text` as-is.
pub fn emit<W>(w: &mut W, text: &str)
    where W: uWrite + ?Sized,
          W::Error: core::fmt::Debug,
{
    if let Err(e) = w.write_str(text) {
        log::warn!("console write dropped: {:?}", e);
    }
}

/// Writes `text` followed by `value` in decimal.
pub fn emit_value<W>(w: &mut W, text: &str, value: u32)
    where W: uWrite + ?Sized,
          W::Error: core::fmt::Debug,
{
    if let Err(e) = uwrite!(w, "{}{}", text, value) {
        log::warn!("console write dropped: {:?}", e);
    }
}

/// Ends the current line.
pub fn emit_newline<W>(w: &mut W)
    where W: uWrite + ?Sized,
          W::Error: core::fmt::Debug,
{
    emit(w, "\r\n");
}
