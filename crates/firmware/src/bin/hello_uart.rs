// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Prints the system header and echoes typed lines back on UART0.

#![no_std]
#![no_main]

use chiselv_hal::map::UART0_BAUD;
use chiselv_hal::{Console, Gpio, Level, Mmio, PinMode, SysCon, Uart};
use core::fmt::Write;
use panic_halt as _;
use riscv_rt::entry;

const LINE_CAPACITY: usize = 128;

#[entry]
fn main() -> ! {
    // Safety: this binary only runs on the ChiselV SoC.
    let regs = unsafe { Mmio::new() };

    let mut uart = Uart::new(regs);
    uart.init();

    let mut gpio = Gpio::new(regs);
    gpio.set_pin_mode(0, PinMode::Output);
    gpio.digital_write(0, Level::High);

    let info = SysCon::new(regs).info();
    let mut console = Console::new(uart);
    let _ = writeln!(console, "ChiselV, a RISC-V RV32I Core");
    let _ = writeln!(console, "clock: {}MHz", info.clock_hz / 1000 / 1000);
    let _ = writeln!(console, "bootaddr: {}", info.boot_addr);
    let _ = writeln!(console, "ROM: {} bytes", info.rom_size);
    let _ = writeln!(console, "RAM: {} bytes", info.ram_size);
    let _ = writeln!(console, "uart0: {}", UART0_BAUD);
    let _ = writeln!(console, "gpio0: {} IO", info.gpio_count);
    console.put_line("-----");

    let mut line = [0u8; LINE_CAPACITY];
    loop {
        console.put_str("> ");
        if let Some(len) = console.read_line(&mut line) {
            console.put_str("You typed: ");
            for &b in &line[..len] {
                console.uart().put_char(b);
            }
            console.put_line("");
        }
    }
}
