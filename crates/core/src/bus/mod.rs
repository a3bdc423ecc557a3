// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::gpio::GpioPort;
use crate::peripherals::syscon::Syscon;
use crate::peripherals::timer::Timer;
use crate::peripherals::uart::{Uart, DEFAULT_FIFO_DEPTH};
use crate::snapshot::BusSnapshot;
use crate::{Peripheral, SimResult, SimulationError};
use anyhow::Context;
use chiselv_config::BoardDescriptor;
use chiselv_hal::map::{GPIO0_BASE, SYSCON_BASE, TIMER0_BASE, UART0_BASE};
use chiselv_hal::SystemInfo;

const REFERENCE_CLOCK_HZ: u32 = 25_000_000;
const DEFAULT_GPIO_PINS: u32 = 8;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u32,
    pub size: u32,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

/// Address decoder for the peripheral windows. There is no RAM or ROM on
/// this bus: programs run on the host and only touch registers.
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    pub cycle: u64,
    /// Accesses that hit no peripheral or were misaligned.
    pub faults: Vec<SimulationError>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        // Reference board wiring, for tests
        let info = SystemInfo {
            clock_hz: REFERENCE_CLOCK_HZ,
            has_uart0: true,
            has_gpio0: true,
            has_pwm0: false,
            has_timer0: true,
            gpio_count: DEFAULT_GPIO_PINS,
            boot_addr: 0,
            rom_size: 64 * 1024,
            ram_size: 64 * 1024,
        };
        Self {
            peripherals: vec![
                PeripheralEntry {
                    name: "syscon".to_string(),
                    base: SYSCON_BASE,
                    size: 0x1000,
                    dev: Box::new(Syscon::new(info)),
                },
                PeripheralEntry {
                    name: "uart0".to_string(),
                    base: UART0_BASE,
                    size: 0x1000,
                    dev: Box::new(Uart::new(DEFAULT_FIFO_DEPTH)),
                },
                PeripheralEntry {
                    name: "gpio0".to_string(),
                    base: GPIO0_BASE,
                    size: 0x1000,
                    dev: Box::new(GpioPort::new(DEFAULT_GPIO_PINS)),
                },
                PeripheralEntry {
                    name: "timer0".to_string(),
                    base: TIMER0_BASE,
                    size: 0x1000,
                    dev: Box::new(Timer::new(REFERENCE_CLOCK_HZ / 1000)),
                },
            ],
            cycle: 0,
            faults: Vec::new(),
        }
    }

    pub fn from_config(board: &BoardDescriptor) -> anyhow::Result<Self> {
        board.validate()?;

        let uart_count = board.peripherals_of_type("uart").count();
        let gpio = board.peripherals_of_type("gpio").next();
        let gpio_count = match gpio {
            Some(p) => p.config_u32("pins")?.unwrap_or(DEFAULT_GPIO_PINS),
            None => 0,
        };
        let info = SystemInfo {
            clock_hz: board.clock_hz,
            has_uart0: uart_count > 0,
            has_gpio0: gpio.is_some(),
            has_pwm0: board.peripherals_of_type("pwm").next().is_some(),
            has_timer0: board.peripherals_of_type("timer").next().is_some(),
            gpio_count,
            boot_addr: board.memory.boot_addr,
            rom_size: board.rom_bytes()?,
            ram_size: board.ram_bytes()?,
        };

        let mut bus = Self {
            peripherals: Vec::new(),
            cycle: 0,
            faults: Vec::new(),
        };

        for p_cfg in &board.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type.as_str() {
                "syscon" => Box::new(Syscon::new(info)),
                "uart" => {
                    let depth = p_cfg
                        .config_u32("fifo_depth")?
                        .map(|d| d as usize)
                        .unwrap_or(DEFAULT_FIFO_DEPTH);
                    Box::new(Uart::new(depth))
                }
                "gpio" => {
                    let pins = p_cfg.config_u32("pins")?.unwrap_or(DEFAULT_GPIO_PINS);
                    if pins > 32 {
                        anyhow::bail!("GPIO '{}' declares {} pins; at most 32", p_cfg.id, pins);
                    }
                    Box::new(GpioPort::new(pins))
                }
                "timer" => {
                    let tick_cycles = p_cfg
                        .config_u32("tick_cycles")?
                        .unwrap_or(board.clock_hz / 1000);
                    if tick_cycles == 0 {
                        anyhow::bail!("Timer '{}' has tick_cycles = 0", p_cfg.id);
                    }
                    Box::new(Timer::new(tick_cycles))
                }
                other => {
                    tracing::warn!(
                        "Unsupported peripheral type '{}' for id '{}'; skipping",
                        other,
                        p_cfg.id
                    );
                    continue;
                }
            };

            let size = p_cfg
                .window_size()
                .with_context(|| format!("Peripheral '{}'", p_cfg.id))?;

            bus.peripherals.push(PeripheralEntry {
                name: p_cfg.id.clone(),
                base: p_cfg.base_address,
                size,
                dev,
            });
        }

        Ok(bus)
    }

    fn find(&self, addr: u32) -> SimResult<usize> {
        if addr % 4 != 0 {
            return Err(SimulationError::MisalignedAccess(addr));
        }
        self.peripherals
            .iter()
            .position(|p| p.contains(addr))
            .ok_or(SimulationError::MemoryViolation(addr))
    }

    fn record<T>(&mut self, result: SimResult<T>) -> SimResult<T> {
        if let Err(e) = &result {
            tracing::warn!("Bus fault: {}", e);
            self.faults.push(e.clone());
        }
        result
    }

    pub fn read_u32(&mut self, addr: u32) -> SimResult<u32> {
        let result = self.find(addr).and_then(|i| {
            let p = &mut self.peripherals[i];
            p.dev.read(addr - p.base)
        });
        self.record(result)
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> SimResult<()> {
        let result = self.find(addr).and_then(|i| {
            let p = &mut self.peripherals[i];
            p.dev.write(addr - p.base, value)
        });
        self.record(result)
    }

    /// Read without side effects, for assertions and snapshots.
    pub fn peek_u32(&self, addr: u32) -> SimResult<u32> {
        let i = self.find(addr)?;
        let p = &self.peripherals[i];
        Ok(p.dev.peek(addr - p.base))
    }

    /// Advance every peripheral by one clock cycle.
    pub fn tick(&mut self) {
        for p in &mut self.peripherals {
            p.dev.tick();
        }
        self.cycle += 1;
    }

    pub fn peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
    }

    pub fn peripheral_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|any| any.downcast_mut::<T>())
    }

    /// Index of the first peripheral of type `T`.
    pub fn index_of<T: 'static>(&self) -> Option<usize> {
        self.peripherals.iter().position(|p| {
            p.dev
                .as_any()
                .is_some_and(|any| any.downcast_ref::<T>().is_some())
        })
    }

    pub fn first<T: 'static>(&self) -> Option<&T> {
        let i = self.index_of::<T>()?;
        self.at(i)
    }

    pub fn first_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let i = self.index_of::<T>()?;
        self.at_mut(i)
    }

    pub fn at<T: 'static>(&self, index: usize) -> Option<&T> {
        self.peripherals
            .get(index)?
            .dev
            .as_any()?
            .downcast_ref::<T>()
    }

    pub fn at_mut<T: 'static>(&mut self, index: usize) -> Option<&mut T> {
        self.peripherals
            .get_mut(index)?
            .dev
            .as_any_mut()?
            .downcast_mut::<T>()
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.first::<Uart>()
    }

    pub fn gpio(&self) -> Option<&GpioPort> {
        self.first::<GpioPort>()
    }

    pub fn gpio_mut(&mut self) -> Option<&mut GpioPort> {
        self.first_mut::<GpioPort>()
    }

    pub fn timer(&self) -> Option<&Timer> {
        self.first::<Timer>()
    }

    pub fn syscon(&self) -> Option<&Syscon> {
        self.first::<Syscon>()
    }

    pub fn syscon_mut(&mut self) -> Option<&mut Syscon> {
        self.first_mut::<Syscon>()
    }

    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            cycle: self.cycle,
            peripherals: self
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }
}
