// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use chiselv_hal::map::TIMER_COUNTER;

/// TIMER0: a free-running 32-bit up-counter.
///
/// The counter advances once every `tick_cycles` clock cycles and wraps.
/// Writing COUNTER loads the value and restarts the prescaler.
#[derive(Debug, serde::Serialize)]
pub struct Timer {
    counter: u32,
    tick_cycles: u32,

    // Internal state
    prescaler: u32,
}

impl Timer {
    pub fn new(tick_cycles: u32) -> Self {
        Self {
            counter: 0,
            tick_cycles: tick_cycles.max(1),
            prescaler: 0,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn tick_cycles(&self) -> u32 {
        self.tick_cycles
    }
}

impl crate::Peripheral for Timer {
    fn read(&mut self, offset: u32) -> SimResult<u32> {
        Ok(self.peek(offset))
    }

    fn write(&mut self, offset: u32, value: u32) -> SimResult<()> {
        if offset == TIMER_COUNTER {
            self.counter = value;
            self.prescaler = 0;
        }
        Ok(())
    }

    fn peek(&self, offset: u32) -> u32 {
        match offset {
            TIMER_COUNTER => self.counter,
            _ => 0,
        }
    }

    fn tick(&mut self) {
        self.prescaler += 1;
        if self.prescaler >= self.tick_cycles {
            self.prescaler = 0;
            self.counter = self.counter.wrapping_add(1);
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
