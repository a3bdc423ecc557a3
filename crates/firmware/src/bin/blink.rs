// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! LED 0 and 1 on, LED 1 off, then forever: LED 3 follows the button on
//! pin 7 and LED 2 blinks ten times.

#![no_std]
#![no_main]

use chiselv_hal::{Gpio, Level, Mmio, PinMode, Timer};
use panic_halt as _;
use riscv_rt::entry;

const BUTTON_PIN: u8 = 7;

#[entry]
fn main() -> ! {
    // Safety: this binary only runs on the ChiselV SoC.
    let regs = unsafe { Mmio::new() };
    let mut gpio = Gpio::new(regs);
    let mut timer = Timer::new(regs);

    for pin in 0..BUTTON_PIN {
        gpio.set_pin_mode(pin, PinMode::Output);
    }
    gpio.set_pin_mode(BUTTON_PIN, PinMode::Input);

    gpio.digital_write(0, Level::High);
    gpio.digital_write(1, Level::High);
    timer.sleep_ms(500);
    gpio.digital_write(1, Level::Low);
    timer.sleep_ms(500);

    loop {
        let button = gpio.digital_read(BUTTON_PIN);
        gpio.digital_write(3, button);

        for _ in 0..10 {
            gpio.digital_write(2, Level::High);
            timer.sleep_ms(200);
            gpio.digital_write(2, Level::Low);
            timer.sleep_ms(200);
        }
        timer.sleep_ms(1000);
    }
}
