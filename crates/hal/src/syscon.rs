// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! System control block: build-time facts about the SoC.

use crate::map::{
    SYSCON_BASE, SYSCON_BOOT_ADDR, SYSCON_CLKINFO, SYSCON_DUMMY, SYSCON_HAS_GPIO0,
    SYSCON_HAS_PWM0, SYSCON_HAS_TIMER0, SYSCON_HAS_UART0, SYSCON_NUM_GPIO0, SYSCON_RAM_SIZE,
    SYSCON_ROM_SIZE,
};
use crate::RegisterAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    pub clock_hz: u32,
    pub has_uart0: bool,
    pub has_gpio0: bool,
    pub has_pwm0: bool,
    pub has_timer0: bool,
    pub gpio_count: u32,
    pub boot_addr: u32,
    pub rom_size: u32,
    pub ram_size: u32,
}

#[derive(Debug)]
pub struct SysCon<R> {
    regs: R,
}

impl<R: RegisterAccess> SysCon<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn release(self) -> R {
        self.regs
    }

    fn reg(&mut self, offset: u32) -> u32 {
        self.regs.read32(SYSCON_BASE + offset)
    }

    pub fn clock_hz(&mut self) -> u32 {
        self.reg(SYSCON_CLKINFO)
    }

    pub fn has_uart0(&mut self) -> bool {
        self.reg(SYSCON_HAS_UART0) != 0
    }

    pub fn has_gpio0(&mut self) -> bool {
        self.reg(SYSCON_HAS_GPIO0) != 0
    }

    pub fn has_pwm0(&mut self) -> bool {
        self.reg(SYSCON_HAS_PWM0) != 0
    }

    pub fn has_timer0(&mut self) -> bool {
        self.reg(SYSCON_HAS_TIMER0) != 0
    }

    pub fn gpio_count(&mut self) -> u32 {
        self.reg(SYSCON_NUM_GPIO0)
    }

    pub fn boot_addr(&mut self) -> u32 {
        self.reg(SYSCON_BOOT_ADDR)
    }

    pub fn rom_size(&mut self) -> u32 {
        self.reg(SYSCON_ROM_SIZE)
    }

    pub fn ram_size(&mut self) -> u32 {
        self.reg(SYSCON_RAM_SIZE)
    }

    pub fn info(&mut self) -> SystemInfo {
        SystemInfo {
            clock_hz: self.clock_hz(),
            has_uart0: self.has_uart0(),
            has_gpio0: self.has_gpio0(),
            has_pwm0: self.has_pwm0(),
            has_timer0: self.has_timer0(),
            gpio_count: self.gpio_count(),
            boot_addr: self.boot_addr(),
            rom_size: self.rom_size(),
            ram_size: self.ram_size(),
        }
    }

    /// Write the DUMMY register. Simulation harnesses treat this as the
    /// end of the run; on silicon it has no effect.
    pub fn signal_exit(&mut self, code: u32) {
        self.regs.write32(SYSCON_BASE + SYSCON_DUMMY, code);
    }
}
