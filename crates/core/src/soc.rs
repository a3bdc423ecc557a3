// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The SoC: bus, host side of the serial link, clock, and run control.
//!
//! Host programs see the SoC through [`SocHandle`], a cloneable
//! [`RegisterAccess`] implementation. Each access charges
//! `cycles_per_access` clock cycles before it reaches the bus, which is the
//! only way time passes. A program that spins forever on a status register
//! therefore still advances the clock, and the handle stops it when a limit
//! trips, the program writes SYSCON DUMMY, or an access faults.
//!
//! Stopping works by unwinding out of the program with a private payload
//! that [`SocHandle::run`] catches. Any other panic is re-raised unchanged.

use crate::bus::SystemBus;
use crate::peripherals::gpio::GpioPort;
use crate::peripherals::uart::Uart;
use crate::serial::{LineDriver, LineMonitor, IDLE};
use crate::snapshot::SocSnapshot;
use crate::{Signals, SimulationError, SimulationObserver, StopReason};
use chiselv_config::BoardDescriptor;
use chiselv_hal::RegisterAccess;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cycles the host waits before typing, so the program can configure the
/// UART first.
pub const DEFAULT_INPUT_DELAY_CYCLES: u64 = 50_000;
pub const DEFAULT_HOST_BAUD: u32 = 115_200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimits {
    pub max_cycles: Option<u64>,
    pub max_uart_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunOutcome {
    pub stop_reason: StopReason,
    pub cycles: u64,
    pub exit_code: Option<u32>,
    /// First bus fault, when the run stopped on one.
    pub fault: Option<String>,
}

/// Unwind payload used to stop a running program.
#[derive(Debug)]
struct Halt(StopReason);

pub struct Soc {
    pub bus: SystemBus,
    /// Host transmitter driving UART0 RX.
    pub host_tx: LineDriver,
    /// Host receiver watching UART0 TX.
    pub host_rx: LineMonitor,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    pub limits: RunLimits,
    clock_hz: u32,
    cycles_per_access: u32,
    uart_index: Option<usize>,
    gpio_index: Option<usize>,
    signals: Signals,
}

impl std::fmt::Debug for Soc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Soc")
            .field("cycle", &self.bus.cycle)
            .field("clock_hz", &self.clock_hz)
            .field("cycles_per_access", &self.cycles_per_access)
            .field("peripherals", &self.bus.peripherals.len())
            .finish()
    }
}

impl Soc {
    pub fn new(bus: SystemBus, clock_hz: u32, cycles_per_access: u32, host_baud: u32) -> Self {
        let host_bit_cycles = (clock_hz / host_baud.max(1)).max(1);
        let uart_index = bus.index_of::<Uart>();
        let gpio_index = bus.index_of::<GpioPort>();
        let mut host_tx = LineDriver::new(host_bit_cycles);
        host_tx.set_start_cycle(DEFAULT_INPUT_DELAY_CYCLES);

        let mut soc = Self {
            bus,
            host_tx,
            host_rx: LineMonitor::new(host_bit_cycles),
            observers: Vec::new(),
            limits: RunLimits::default(),
            clock_hz,
            cycles_per_access: cycles_per_access.max(1),
            uart_index,
            gpio_index,
            signals: Signals::default(),
        };
        soc.signals = soc.sample_signals();
        soc
    }

    /// The reference board with default wiring.
    pub fn reference() -> Self {
        Self::new(SystemBus::new(), 25_000_000, 4, DEFAULT_HOST_BAUD)
    }

    pub fn from_config(board: &BoardDescriptor) -> anyhow::Result<Self> {
        let bus = SystemBus::from_config(board)?;
        let host_baud = match board.peripherals_of_type("uart").next() {
            Some(p) => p.config_u32("host_baud")?.unwrap_or(DEFAULT_HOST_BAUD),
            None => DEFAULT_HOST_BAUD,
        };
        if host_baud == 0 {
            anyhow::bail!("UART 'host_baud' must be greater than zero");
        }
        Ok(Self::new(
            bus,
            board.clock_hz,
            board.cycles_per_access,
            host_baud,
        ))
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    pub fn cycle(&self) -> u64 {
        self.bus.cycle
    }

    pub fn signals(&self) -> Signals {
        self.signals
    }

    pub fn exit_code(&self) -> Option<u32> {
        self.bus.syscon().and_then(|s| s.exit_code())
    }

    /// Queue bytes for the host to type into UART0.
    pub fn type_input(&mut self, bytes: &[u8]) {
        self.host_tx.queue(bytes);
    }

    /// Drive a GPIO input pad from outside the chip.
    pub fn set_gpio_input(&mut self, pin: u32, high: bool) {
        if let Some(gpio) = self.bus.gpio_mut() {
            gpio.set_input(pin, high);
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    fn sample_signals(&self) -> Signals {
        let gpio = self.gpio_index.and_then(|i| self.bus.at::<GpioPort>(i));
        let uart = self.uart_index.and_then(|i| self.bus.at::<Uart>(i));
        Signals {
            gpio_dir: gpio.map(|g| g.direction()).unwrap_or(0),
            gpio_pads: gpio.map(|g| g.pads()).unwrap_or(0),
            uart_tx: uart.map(|u| u.tx_line()).unwrap_or(IDLE),
            uart_rx: uart.map(|u| u.rx_line()).unwrap_or(IDLE),
        }
    }

    /// Run the clock for `cycles` cycles with no bus traffic.
    pub fn advance(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.step_cycle();
        }
    }

    fn step_cycle(&mut self) {
        let cycle = self.bus.cycle;
        let rx_level = self.host_tx.tick(cycle);
        if let Some(uart) = self.uart_index.and_then(|i| self.bus.at_mut::<Uart>(i)) {
            uart.set_rx_line(rx_level);
        }

        self.bus.tick();

        if let Some(uart) = self.uart_index.and_then(|i| self.bus.at::<Uart>(i)) {
            let tx_level = uart.tx_line();
            self.host_rx.sample(tx_level);
        }

        if !self.observers.is_empty() {
            let signals = self.sample_signals();
            if signals != self.signals {
                self.signals = signals;
                for observer in &self.observers {
                    observer.on_signals(self.bus.cycle, &signals);
                }
            }
        }
    }

    fn check_limits(&self) -> Result<(), StopReason> {
        if let Some(max) = self.limits.max_cycles {
            if self.bus.cycle >= max {
                return Err(StopReason::MaxCycles);
            }
        }
        if let Some(max) = self.limits.max_uart_bytes {
            if self.host_rx.received() >= max {
                return Err(StopReason::MaxUartBytes);
            }
        }
        Ok(())
    }

    fn fault(&self, e: &SimulationError) -> StopReason {
        tracing::error!("Program stopped by bus fault: {}", e);
        StopReason::MemoryViolation
    }

    /// One program read: charge the access, then hit the bus.
    pub fn access_read(&mut self, addr: u32) -> Result<u32, StopReason> {
        self.check_limits()?;
        self.advance(self.cycles_per_access as u64);
        let value = self.bus.read_u32(addr).map_err(|e| self.fault(&e))?;
        tracing::trace!("read  {:#010x} -> {:#x} @{}", addr, value, self.bus.cycle);
        for observer in &self.observers {
            observer.on_register_read(self.bus.cycle, addr, value);
        }
        Ok(value)
    }

    /// One program write. Stops with `Exit` when it was a SYSCON DUMMY write.
    pub fn access_write(&mut self, addr: u32, value: u32) -> Result<(), StopReason> {
        self.check_limits()?;
        self.advance(self.cycles_per_access as u64);
        self.bus
            .write_u32(addr, value)
            .map_err(|e| self.fault(&e))?;
        tracing::trace!("write {:#010x} <- {:#x} @{}", addr, value, self.bus.cycle);
        for observer in &self.observers {
            observer.on_register_write(self.bus.cycle, addr, value);
        }
        if self
            .bus
            .syscon_mut()
            .and_then(|s| s.take_exit_request())
            .is_some()
        {
            return Err(StopReason::Exit);
        }
        Ok(())
    }

    /// Keep the clock running until the host has typed everything and the
    /// device transmitter is idle, or `max_cycles` more cycles have passed.
    pub fn drain(&mut self, max_cycles: u64) {
        for _ in 0..max_cycles {
            let uart_idle = self
                .uart_index
                .and_then(|i| self.bus.at::<Uart>(i))
                .map(|u| {
                    u.status()
                        .contains(chiselv_hal::UartStatus::TX_EMPTY)
                })
                .unwrap_or(true);
            if uart_idle && self.host_tx.pending() == 0 && self.host_rx.is_idle() {
                break;
            }
            self.step_cycle();
        }
    }

    pub fn snapshot(&self) -> SocSnapshot {
        SocSnapshot {
            bus: self.bus.snapshot(),
            uart_rx_pending: self.host_tx.pending(),
            uart_tx_received: self.host_rx.received(),
            exit_code: self.exit_code(),
        }
    }

    pub fn into_handle(self) -> SocHandle {
        SocHandle {
            inner: Arc::new(Mutex::new(self)),
        }
    }
}

/// Shared handle to a [`Soc`]. Clones address the same SoC.
#[derive(Debug, Clone)]
pub struct SocHandle {
    inner: Arc<Mutex<Soc>>,
}

impl SocHandle {
    pub fn lock(&self) -> MutexGuard<'_, Soc> {
        // A program unwinding out of an access never holds the lock, but a
        // panicking observer might.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `program` against this SoC until it returns or is stopped.
    ///
    /// Panics raised by the program itself propagate to the caller.
    pub fn run<F>(&self, program: F) -> RunOutcome
    where
        F: FnOnce(SocHandle),
    {
        {
            let soc = self.lock();
            for observer in &soc.observers {
                observer.on_simulation_start();
            }
        }

        let handle = self.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(move || program(handle)));
        let stop_reason = match result {
            Ok(()) => StopReason::Returned,
            Err(payload) => match payload.downcast::<Halt>() {
                Ok(halt) => halt.0,
                Err(other) => panic::resume_unwind(other),
            },
        };

        let soc = self.lock();
        let cycles = soc.cycle();
        for observer in &soc.observers {
            observer.on_simulation_stop(cycles);
        }
        let fault = if stop_reason == StopReason::MemoryViolation {
            soc.bus.faults.first().map(|e| e.to_string())
        } else {
            None
        };
        tracing::info!("Stopped: {:?} after {} cycles", stop_reason, cycles);

        RunOutcome {
            stop_reason,
            cycles,
            exit_code: soc.exit_code(),
            fault,
        }
    }

    fn halt(reason: StopReason) -> ! {
        panic::resume_unwind(Box::new(Halt(reason)))
    }
}

impl RegisterAccess for SocHandle {
    fn read32(&mut self, addr: u32) -> u32 {
        let result = self.lock().access_read(addr);
        match result {
            Ok(value) => value,
            Err(reason) => Self::halt(reason),
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        let result = self.lock().access_write(addr, value);
        if let Err(reason) = result {
            Self::halt(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chiselv_hal::map::{GPIO0_BASE, SYSCON_BASE, TIMER0_BASE};

    #[test]
    fn test_access_charges_cycles() {
        let handle = Soc::reference().into_handle();
        let mut regs = handle.clone();
        regs.read32(TIMER0_BASE);
        regs.write32(GPIO0_BASE, 1);
        assert_eq!(handle.lock().cycle(), 8);
    }

    #[test]
    fn test_returning_program() {
        let handle = Soc::reference().into_handle();
        let outcome = handle.run(|mut regs| {
            regs.write32(GPIO0_BASE, 0xFF);
        });
        assert_eq!(outcome.stop_reason, StopReason::Returned);
        assert_eq!(outcome.exit_code, None);
    }

    #[test]
    fn test_exit_write_stops_program() {
        let handle = Soc::reference().into_handle();
        let outcome = handle.run(|mut regs| {
            regs.write32(SYSCON_BASE, 3);
            regs.write32(GPIO0_BASE, 0xFF);
        });
        assert_eq!(outcome.stop_reason, StopReason::Exit);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(handle.lock().bus.peek_u32(GPIO0_BASE).unwrap(), 0);
    }

    #[test]
    fn test_cycle_limit_stops_spinning_program() {
        let mut soc = Soc::reference();
        soc.limits.max_cycles = Some(1_000);
        let handle = soc.into_handle();
        let outcome = handle.run(|mut regs| loop {
            regs.read32(TIMER0_BASE);
        });
        assert_eq!(outcome.stop_reason, StopReason::MaxCycles);
        assert_eq!(outcome.cycles, 1_000);
    }

    #[test]
    fn test_unmapped_access_stops_with_fault() {
        let handle = Soc::reference().into_handle();
        let outcome = handle.run(|mut regs| {
            regs.read32(0x5000_0000);
        });
        assert_eq!(outcome.stop_reason, StopReason::MemoryViolation);
        assert!(outcome.fault.unwrap().contains("0x50000000"));
    }

    #[test]
    #[should_panic(expected = "program bug")]
    fn test_program_panics_propagate() {
        let handle = Soc::reference().into_handle();
        handle.run(|_| panic!("program bug"));
    }

    #[test]
    fn test_signals_reported_on_change() {
        #[derive(Debug, Default)]
        struct Recorder(Mutex<Vec<Signals>>);
        impl SimulationObserver for Recorder {
            fn on_signals(&self, _cycle: u64, signals: &Signals) {
                self.0.lock().unwrap().push(*signals);
            }
        }

        let recorder = Arc::new(Recorder::default());
        let mut soc = Soc::reference();
        soc.add_observer(recorder.clone());
        let handle = soc.into_handle();
        handle.run(|mut regs| {
            regs.write32(GPIO0_BASE, 0x01);
            regs.write32(GPIO0_BASE + 4, 0x01);
            regs.write32(GPIO0_BASE + 4, 0x01);
        });

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].gpio_dir, 1);
        assert_eq!(seen[1].gpio_pads, 1);
    }
}
