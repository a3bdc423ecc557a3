// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! ChiselV memory map. These addresses are a hardware contract.

/// System control block (read-only info registers).
pub const SYSCON_BASE: u32 = 0x0000_1000;
pub const SYSCON_DUMMY: u32 = 0x00;
pub const SYSCON_CLKINFO: u32 = 0x08;
pub const SYSCON_HAS_UART0: u32 = 0x10;
pub const SYSCON_HAS_GPIO0: u32 = 0x18;
pub const SYSCON_HAS_PWM0: u32 = 0x20;
pub const SYSCON_HAS_TIMER0: u32 = 0x24;
pub const SYSCON_NUM_GPIO0: u32 = 0x28;
pub const SYSCON_BOOT_ADDR: u32 = 0x2C;
pub const SYSCON_ROM_SIZE: u32 = 0x30;
pub const SYSCON_RAM_SIZE: u32 = 0x34;

pub const UART0_BASE: u32 = 0x3000_0000;
pub const UART_TX: u32 = 0x00;
pub const UART_RX: u32 = 0x04;
pub const UART_STATUS: u32 = 0x0C;
pub const UART_CLOCKDIV: u32 = 0x10;

pub const GPIO0_BASE: u32 = 0x3000_1000;
pub const GPIO_DIR: u32 = 0x00;
pub const GPIO_VAL: u32 = 0x04;

pub const TIMER0_BASE: u32 = 0x3000_3000;
pub const TIMER_COUNTER: u32 = 0x00;

/// Baud rate programmed by `Uart::init`.
pub const UART0_BAUD: u32 = 115_200;
