// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! GPIO direction/value driver.
//!
//! One controller has a direction register and a value register, one bit per
//! pin. A set direction bit makes the pin an output.
//!
//! Pin updates are read-modify-write sequences on a register shared by all
//! pins of the controller. They are only safe from a single execution
//! context; an interrupt handler touching the same controller would need a
//! critical section around each update.

use crate::map::{GPIO0_BASE, GPIO_DIR, GPIO_VAL};
use crate::RegisterAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input = 0,
    Output = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level == Level::High
    }
}

#[derive(Debug)]
pub struct Gpio<R> {
    regs: R,
    base: u32,
}

impl<R: RegisterAccess> Gpio<R> {
    /// GPIO0 at its fixed base address.
    pub fn new(regs: R) -> Self {
        Self::with_base(regs, GPIO0_BASE)
    }

    pub fn with_base(regs: R, base: u32) -> Self {
        Self { regs, base }
    }

    pub fn release(self) -> R {
        self.regs
    }

    pub fn set_direction(&mut self, bits: u32) {
        self.regs.write32(self.base + GPIO_DIR, bits);
    }

    pub fn read_direction(&mut self) -> u32 {
        self.regs.read32(self.base + GPIO_DIR)
    }

    pub fn set_value(&mut self, bits: u32) {
        self.regs.write32(self.base + GPIO_VAL, bits);
    }

    pub fn read_value(&mut self) -> u32 {
        self.regs.read32(self.base + GPIO_VAL)
    }

    pub fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        let dir = update_bit(self.read_direction(), pin, mode == PinMode::Output);
        self.set_direction(dir);
    }

    pub fn digital_write(&mut self, pin: u8, level: Level) {
        let value = update_bit(self.read_value(), pin, level.into());
        self.set_value(value);
    }

    pub fn digital_read(&mut self, pin: u8) -> Level {
        Level::from(self.read_value() & pin_mask(pin) != 0)
    }
}

fn pin_mask(pin: u8) -> u32 {
    debug_assert!(pin < 32, "GPIO pin {} out of range", pin);
    1u32 << (pin & 31)
}

fn update_bit(reg: u32, pin: u8, set: bool) -> u32 {
    let mask = pin_mask(pin);
    if set {
        reg | mask
    } else {
        reg & !mask
    }
}
