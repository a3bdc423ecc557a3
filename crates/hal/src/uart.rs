// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Blocking UART driver.
//!
//! `init` must run once, after the system clock is stable and before any
//! transfer. Transfers spin on the status register with no timeout.

use crate::map::{
    SYSCON_BASE, SYSCON_CLKINFO, UART0_BASE, UART0_BAUD, UART_CLOCKDIV, UART_RX, UART_STATUS,
    UART_TX,
};
use crate::RegisterAccess;
use bitflags::bitflags;

bitflags! {
    /// UART STATUS register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        const RX_EMPTY = 1 << 0;
        const TX_EMPTY = 1 << 1;
        const RX_FULL = 1 << 2;
        const TX_FULL = 1 << 3;
    }
}

/// Clock divisor for `baud`: `clock_hz / (baud * 16) - 1`.
///
/// Clocks slower than `16 * baud` give 0, the fastest setting.
pub const fn divisor(clock_hz: u32, baud: u32) -> u32 {
    (clock_hz / (baud * 16)).saturating_sub(1)
}

#[derive(Debug)]
pub struct Uart<R> {
    regs: R,
    base: u32,
}

impl<R: RegisterAccess> Uart<R> {
    pub fn new(regs: R) -> Self {
        Self::with_base(regs, UART0_BASE)
    }

    pub fn with_base(regs: R, base: u32) -> Self {
        Self { regs, base }
    }

    pub fn release(self) -> R {
        self.regs
    }

    fn reg_read(&mut self, offset: u32) -> u32 {
        self.regs.read32(self.base + offset)
    }

    fn reg_write(&mut self, offset: u32, value: u32) {
        self.regs.write32(self.base + offset, value);
    }

    /// Program the divisor for the default 115200 baud.
    pub fn init(&mut self) {
        self.init_with_baud(UART0_BAUD);
    }

    pub fn init_with_baud(&mut self, baud: u32) {
        let clock_hz = self.regs.read32(SYSCON_BASE + SYSCON_CLKINFO);
        self.reg_write(UART_CLOCKDIV, divisor(clock_hz, baud));
    }

    pub fn clock_divisor(&mut self) -> u32 {
        self.reg_read(UART_CLOCKDIV)
    }

    pub fn status(&mut self) -> Status {
        Status::from_bits_truncate(self.reg_read(UART_STATUS))
    }

    pub fn is_rx_empty(&mut self) -> bool {
        self.status().contains(Status::RX_EMPTY)
    }

    pub fn is_tx_full(&mut self) -> bool {
        self.status().contains(Status::TX_FULL)
    }

    pub fn read_byte(&mut self) -> u8 {
        (self.reg_read(UART_RX) & 0xFF) as u8
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.reg_write(UART_TX, byte as u32);
    }

    pub fn wait_rx_ready(&mut self) {
        while self.is_rx_empty() {
            core::hint::spin_loop();
        }
    }

    pub fn wait_tx_ready(&mut self) {
        while self.is_tx_full() {
            core::hint::spin_loop();
        }
    }

    /// Spin until the transmitter has shifted out every queued byte.
    pub fn flush(&mut self) {
        while !self.status().contains(Status::TX_EMPTY) {
            core::hint::spin_loop();
        }
    }

    pub fn get_char(&mut self) -> u8 {
        self.wait_rx_ready();
        self.read_byte()
    }

    /// Transmit `byte`, sending `\r` ahead of every `\n`.
    pub fn put_char(&mut self, byte: u8) {
        if byte == b'\n' {
            self.wait_tx_ready();
            self.write_byte(b'\r');
        }
        self.wait_tx_ready();
        self.write_byte(byte);
    }
}
