// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Drivers for the ChiselV SoC peripherals.
//!
//! Every driver is generic over [`RegisterAccess`]. On the target the access
//! primitive is [`Mmio`], which issues volatile loads and stores. On a host the
//! same drivers run against the `chiselv-sim` register model or a test fake.
//!
//! All operations are synchronous. Waits are busy-polls with no timeout: a
//! driver blocked on an empty receive FIFO blocks until a byte arrives.

#![cfg_attr(not(test), no_std)]

pub mod console;
pub mod gpio;
pub mod map;
pub mod mmio;
pub mod syscon;
pub mod timer;
pub mod uart;

#[cfg(test)]
mod testing;

pub use console::Console;
pub use gpio::{Gpio, Level, PinMode};
pub use mmio::{Mmio, RegisterAccess};
pub use syscon::{SysCon, SystemInfo};
pub use timer::Timer;
pub use uart::{Status as UartStatus, Uart};
