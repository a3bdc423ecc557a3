// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register-level model of the ChiselV SoC.
//!
//! The HAL drivers run unmodified on the host against a [`soc::SocHandle`],
//! which implements [`chiselv_hal::RegisterAccess`]. Every register access
//! advances simulated time, so UART framing and the timer behave the way
//! they do on the FPGA.

pub mod bus;
pub mod metrics;
pub mod peripherals;
pub mod serial;
pub mod snapshot;
pub mod soc;

use std::any::Any;

pub use chiselv_config::StopReason;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u32),
    #[error("Misaligned register access at {0:#x}")]
    MisalignedAccess(u32),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Wire and pad state sampled once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Signals {
    pub gpio_dir: u32,
    pub gpio_pads: u32,
    /// Device transmit line, idle high.
    pub uart_tx: bool,
    /// Device receive line, idle high.
    pub uart_rx: bool,
}

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self, _cycle: u64) {}
    fn on_register_read(&self, _cycle: u64, _addr: u32, _value: u32) {}
    fn on_register_write(&self, _cycle: u64, _addr: u32, _value: u32) {}
    /// Called only when a signal changed since the previous cycle.
    fn on_signals(&self, _cycle: u64, _signals: &Signals) {}
}

/// A memory-mapped peripheral with 32-bit registers.
///
/// Offsets are relative to the peripheral base and always word aligned;
/// the bus rejects anything else before it gets here.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u32) -> SimResult<u32>;
    fn write(&mut self, offset: u32, value: u32) -> SimResult<()>;
    /// Side-effect free read used by snapshots and assertions.
    fn peek(&self, offset: u32) -> u32;
    /// Advance one clock cycle.
    fn tick(&mut self) {}
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
