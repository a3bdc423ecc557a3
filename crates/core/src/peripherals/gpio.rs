// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use chiselv_hal::map::{GPIO_DIR, GPIO_VAL};

/// GPIO0: one direction register and one value register.
///
/// A DIR bit of 1 makes the pin an output. VALUE reads back the output latch
/// for output pins and the externally driven level for input pins. Bits at or
/// above the pin count read as zero and ignore writes.
#[derive(Debug, serde::Serialize)]
pub struct GpioPort {
    pins: u32,
    dir: u32,
    out: u32,
    /// Levels driven onto the pads from outside the chip.
    inputs: u32,
}

impl Default for GpioPort {
    fn default() -> Self {
        Self::new(8)
    }
}

impl GpioPort {
    pub fn new(pins: u32) -> Self {
        Self {
            pins: pins.min(32),
            dir: 0,
            out: 0,
            inputs: 0,
        }
    }

    pub fn pins(&self) -> u32 {
        self.pins
    }

    fn mask(&self) -> u32 {
        if self.pins >= 32 {
            u32::MAX
        } else {
            (1u32 << self.pins) - 1
        }
    }

    pub fn direction(&self) -> u32 {
        self.dir
    }

    /// Level seen on every pad.
    pub fn pads(&self) -> u32 {
        ((self.out & self.dir) | (self.inputs & !self.dir)) & self.mask()
    }

    pub fn pad(&self, pin: u32) -> bool {
        pin < 32 && (self.pads() >> pin) & 1 == 1
    }

    /// Drive an input pad from the outside. Ignored for pins past the count.
    pub fn set_input(&mut self, pin: u32, high: bool) {
        if pin >= self.pins {
            tracing::warn!("GPIO: pin {} out of range ({} pins)", pin, self.pins);
            return;
        }
        if high {
            self.inputs |= 1 << pin;
        } else {
            self.inputs &= !(1 << pin);
        }
    }

    fn read_reg(&self, offset: u32) -> u32 {
        match offset {
            GPIO_DIR => self.dir,
            GPIO_VAL => self.pads(),
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        match offset {
            GPIO_DIR => {
                let dir = value & self.mask();
                if dir != self.dir {
                    tracing::debug!("GPIO: DIR {:#x} -> {:#x}", self.dir, dir);
                }
                self.dir = dir;
            }
            GPIO_VAL => self.out = value & self.mask(),
            _ => {}
        }
    }
}

impl crate::Peripheral for GpioPort {
    fn read(&mut self, offset: u32) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write(&mut self, offset: u32, value: u32) -> SimResult<()> {
        self.write_reg(offset, value);
        Ok(())
    }

    fn peek(&self, offset: u32) -> u32 {
        self.read_reg(offset)
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
