// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Free-running timer driver.
//!
//! The counter advances at a rate fixed by the hardware. `sleep_ms` assumes
//! one tick per millisecond, which holds on the reference board; the driver
//! does not calibrate.

use crate::map::{TIMER0_BASE, TIMER_COUNTER};
use crate::RegisterAccess;

#[derive(Debug)]
pub struct Timer<R> {
    regs: R,
    base: u32,
}

impl<R: RegisterAccess> Timer<R> {
    pub fn new(regs: R) -> Self {
        Self::with_base(regs, TIMER0_BASE)
    }

    pub fn with_base(regs: R, base: u32) -> Self {
        Self { regs, base }
    }

    pub fn release(self) -> R {
        self.regs
    }

    pub fn set(&mut self, value: u32) {
        self.regs.write32(self.base + TIMER_COUNTER, value);
    }

    pub fn get(&mut self) -> u32 {
        self.regs.read32(self.base + TIMER_COUNTER)
    }

    pub fn reset(&mut self) {
        self.set(0);
    }

    /// Spin until the counter is strictly past `deadline`.
    pub fn wait_until(&mut self, deadline: u32) {
        while self.get() <= deadline {
            core::hint::spin_loop();
        }
    }

    /// Block for `ms` ticks. Leaves the counter at zero.
    pub fn sleep_ms(&mut self, ms: u32) {
        self.reset();
        let start = self.get();
        self.wait_until(start.wrapping_add(ms));
        self.reset();
    }
}
