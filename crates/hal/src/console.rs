// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Line-oriented console on top of the UART.
//!
//! Output goes through [`Uart::put_char`], so every `\n` reaches the wire as
//! CRLF. Formatted output uses `core::fmt::Write`.

use crate::uart::Uart;
use crate::RegisterAccess;
use core::fmt;

const BACKSPACE: u8 = 0x08;

#[derive(Debug)]
pub struct Console<R> {
    uart: Uart<R>,
}

impl<R: RegisterAccess> Console<R> {
    /// Wrap an already initialized UART.
    pub fn new(uart: Uart<R>) -> Self {
        Self { uart }
    }

    pub fn uart(&mut self) -> &mut Uart<R> {
        &mut self.uart
    }

    pub fn release(self) -> Uart<R> {
        self.uart
    }

    pub fn put_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.uart.put_char(byte);
        }
    }

    pub fn put_line(&mut self, s: &str) {
        self.put_str(s);
        self.uart.put_char(b'\n');
    }

    /// Read one line into `buf`, echoing what is typed.
    ///
    /// Stops at CR, LF or a full buffer; the terminator is not stored.
    /// Backspace removes the previous byte. Returns `None` for an empty line.
    pub fn read_line(&mut self, buf: &mut [u8]) -> Option<usize> {
        let mut len = 0;
        while len < buf.len() {
            let c = self.uart.get_char();
            if c == b'\r' || c == b'\n' {
                break;
            }
            self.uart.put_char(c);
            if c == BACKSPACE {
                len = len.saturating_sub(1);
            } else {
                buf[len] = c;
                len += 1;
            }
        }
        self.uart.put_char(b'\n');

        if len == 0 {
            None
        } else {
            Some(len)
        }
    }
}

impl<R: RegisterAccess> fmt::Write for Console<R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_str(s);
        Ok(())
    }
}
