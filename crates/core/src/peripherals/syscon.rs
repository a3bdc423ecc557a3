// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use chiselv_hal::map::{
    SYSCON_BOOT_ADDR, SYSCON_CLKINFO, SYSCON_DUMMY, SYSCON_HAS_GPIO0, SYSCON_HAS_PWM0,
    SYSCON_HAS_TIMER0, SYSCON_HAS_UART0, SYSCON_NUM_GPIO0, SYSCON_RAM_SIZE, SYSCON_ROM_SIZE,
};
use chiselv_hal::SystemInfo;

/// System control block. Every register is read-only except DUMMY.
///
/// A write to DUMMY latches the value as the program's exit code and raises
/// an exit request that the SoC consumes to stop the run.
#[derive(Debug, serde::Serialize)]
pub struct Syscon {
    #[serde(skip)]
    info: SystemInfo,
    dummy: u32,
    exit_code: Option<u32>,
    #[serde(skip)]
    exit_requested: bool,
}

impl Syscon {
    pub fn new(info: SystemInfo) -> Self {
        Self {
            info,
            dummy: 0,
            exit_code: None,
            exit_requested: false,
        }
    }

    pub fn info(&self) -> &SystemInfo {
        &self.info
    }

    pub fn exit_code(&self) -> Option<u32> {
        self.exit_code
    }

    /// Returns the code of an exit written since the last call.
    pub fn take_exit_request(&mut self) -> Option<u32> {
        if std::mem::take(&mut self.exit_requested) {
            self.exit_code
        } else {
            None
        }
    }
}

impl crate::Peripheral for Syscon {
    fn read(&mut self, offset: u32) -> SimResult<u32> {
        Ok(self.peek(offset))
    }

    fn write(&mut self, offset: u32, value: u32) -> SimResult<()> {
        if offset == SYSCON_DUMMY {
            tracing::info!("SYSCON: exit requested with code {}", value);
            self.dummy = value;
            self.exit_code = Some(value);
            self.exit_requested = true;
        } else {
            tracing::warn!("SYSCON: ignoring write to read-only offset {:#x}", offset);
        }
        Ok(())
    }

    fn peek(&self, offset: u32) -> u32 {
        let info = &self.info;
        match offset {
            SYSCON_DUMMY => self.dummy,
            SYSCON_CLKINFO => info.clock_hz,
            SYSCON_HAS_UART0 => info.has_uart0 as u32,
            SYSCON_HAS_GPIO0 => info.has_gpio0 as u32,
            SYSCON_HAS_PWM0 => info.has_pwm0 as u32,
            SYSCON_HAS_TIMER0 => info.has_timer0 as u32,
            SYSCON_NUM_GPIO0 => info.gpio_count,
            SYSCON_BOOT_ADDR => info.boot_addr,
            SYSCON_ROM_SIZE => info.rom_size,
            SYSCON_RAM_SIZE => info.ram_size,
            _ => 0,
        }
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
