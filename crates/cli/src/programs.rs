// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Demo programs, written against the HAL only.
//!
//! They are the host twins of the firmware binaries: the same driver calls,
//! except that they end by writing SYSCON DUMMY so a run terminates.

use chiselv_config::Program;
use chiselv_hal::map::UART0_BAUD;
use chiselv_hal::{Console, Gpio, Level, PinMode, RegisterAccess, SysCon, SystemInfo, Timer, Uart};
use std::fmt::{self, Write};

pub const BANNER: &str = r"  ___ _    _         _ __   __
 / __| |_ (_)___ ___| |\ \ / /
| (__| ' \| (_-</ -_) | \ V /
 \___|_||_|_/__/\___|_|  \_/
";

pub const ECHO_HELP: &str =
    "This demo prints back to the console all typed characters when hit <enter>.";

/// End-of-transmission: ends the echo session.
pub const EOT: u8 = 0x04;

const LINE_CAPACITY: usize = 128;

const BUTTON_PIN: u8 = 7;
const BUTTON_LED: u8 = 3;
const BLINK_LED: u8 = 2;

/// Run `program` to completion on `regs`.
pub fn run<R: RegisterAccess + Clone>(program: Program, regs: R, rounds: u32) {
    match program {
        Program::Blink => blink(regs, rounds),
        Program::Echo => echo(regs),
    }
}

/// LED sequence: LEDs 0 and 1 on, LED 1 off after half a second, then per
/// round mirror the button on pin 7 to LED 3 and blink LED 2 ten times.
///
/// `rounds == 0` loops forever.
pub fn blink<R: RegisterAccess + Clone>(regs: R, rounds: u32) {
    let mut gpio = Gpio::new(regs.clone());
    let mut timer = Timer::new(regs.clone());

    // Direction IOOOOOOO, pin 7 on the left
    for pin in 0..BUTTON_PIN {
        gpio.set_pin_mode(pin, PinMode::Output);
    }
    gpio.set_pin_mode(BUTTON_PIN, PinMode::Input);

    gpio.digital_write(0, Level::High);
    gpio.digital_write(1, Level::High);
    timer.sleep_ms(500);
    gpio.digital_write(1, Level::Low);
    timer.sleep_ms(500);

    let mut round = 0;
    while rounds == 0 || round < rounds {
        let button = gpio.digital_read(BUTTON_PIN);
        gpio.digital_write(BUTTON_LED, button);

        for _ in 0..10 {
            gpio.digital_write(BLINK_LED, Level::High);
            timer.sleep_ms(200);
            gpio.digital_write(BLINK_LED, Level::Low);
            timer.sleep_ms(200);
        }
        timer.sleep_ms(1000);
        round += 1;
    }

    SysCon::new(regs).signal_exit(0);
}

pub fn write_header<W: Write>(out: &mut W, info: &SystemInfo) -> fmt::Result {
    writeln!(out, "ChiselV, a RISC-V RV32I Core")?;
    writeln!(out, "clock: {}MHz", info.clock_hz / 1000 / 1000)?;
    writeln!(out, "bootaddr: {}", info.boot_addr)?;
    writeln!(out, "ROM: {} bytes", info.rom_size)?;
    writeln!(out, "RAM: {} bytes", info.ram_size)?;
    writeln!(out, "uart0: {}", UART0_BAUD)?;
    writeln!(out, "gpio0: {} IO", info.gpio_count)?;
    writeln!(out, "-----")
}

/// UART line echo. Prints the system header and banner, then echoes typed
/// characters; on CR reports the whole line. EOT flushes and exits.
pub fn echo<R: RegisterAccess + Clone>(regs: R) {
    let mut uart = Uart::new(regs.clone());
    uart.init();

    // LED 0 says we're alive
    let mut gpio = Gpio::new(regs.clone());
    gpio.set_pin_mode(0, PinMode::Output);
    gpio.digital_write(0, Level::High);

    let info = SysCon::new(regs.clone()).info();
    let mut console = Console::new(uart);
    // Console output cannot fail.
    let _ = write_header(&mut console, &info);
    console.put_str(BANNER);
    console.put_line(ECHO_HELP);
    console.put_str("> ");

    let mut line = [0u8; LINE_CAPACITY];
    let mut len = 0;
    loop {
        let c = console.uart().get_char();
        match c {
            EOT => {
                console.uart().flush();
                SysCon::new(regs).signal_exit(0);
                return;
            }
            b'\r' => {
                console.put_line("");
                console.put_str("You typed: ");
                for &b in &line[..len] {
                    console.uart().put_char(b);
                }
                len = 0;
                console.put_line("");
                console.put_str("> ");
            }
            _ => {
                if len < LINE_CAPACITY {
                    line[len] = c;
                    len += 1;
                }
                console.uart().put_char(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chiselv_config::BoardDescriptor;
    use chiselv_sim::soc::Soc;
    use chiselv_sim::StopReason;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn fast_soc() -> Soc {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let board =
            BoardDescriptor::from_file(root.join("../../configs/boards/chiselv-fast.yaml")).unwrap();
        Soc::from_config(&board).unwrap()
    }

    #[test]
    fn test_header_format() {
        let info = SystemInfo {
            clock_hz: 25_000_000,
            has_uart0: true,
            has_gpio0: true,
            has_pwm0: false,
            has_timer0: true,
            gpio_count: 8,
            boot_addr: 0,
            rom_size: 65536,
            ram_size: 65536,
        };
        let mut out = String::new();
        write_header(&mut out, &info).unwrap();
        assert_eq!(
            out,
            "ChiselV, a RISC-V RV32I Core\nclock: 25MHz\nbootaddr: 0\nROM: 65536 bytes\n\
             RAM: 65536 bytes\nuart0: 115200\ngpio0: 8 IO\n-----\n"
        );
    }

    #[test]
    fn test_blink_one_round() {
        let mut soc = fast_soc();
        soc.set_gpio_input(BUTTON_PIN as u32, true);
        let handle = soc.into_handle();

        let outcome = handle.run(|regs| blink(regs, 1));

        assert_eq!(outcome.stop_reason, StopReason::Exit);
        let soc = handle.lock();
        let gpio = soc.bus.gpio().unwrap();
        assert_eq!(gpio.direction(), 0x7F);
        // LED0 on, LED1 off, LED2 off after the last blink, LED3 mirrors the button.
        assert_eq!(gpio.pads() & 0x0F, 0b1001);
        // 1000 ms setup plus 5000 ms per round, 64 cycles per tick.
        assert!(outcome.cycles >= 6000 * 64);
    }

    #[test]
    fn test_echo_session() {
        let mut soc = fast_soc();
        let sink = Arc::new(Mutex::new(Vec::new()));
        soc.host_rx.set_sink(Some(sink.clone()), false);
        soc.host_tx.set_start_cycle(2_000_000);
        soc.type_input(b"hi\r");
        soc.type_input(&[EOT]);
        soc.limits.max_cycles = Some(20_000_000);
        let handle = soc.into_handle();

        let outcome = handle.run(echo);
        handle.lock().drain(100_000);

        assert_eq!(outcome.stop_reason, StopReason::Exit);
        let text = String::from_utf8_lossy(&sink.lock().unwrap()).to_string();
        assert!(text.starts_with("ChiselV, a RISC-V RV32I Core\r\nclock: 25MHz\r\n"));
        assert!(text.contains("gpio0: 8 IO\r\n-----\r\n"));
        assert!(text.contains("> hi\r\nYou typed: hi\r\n> "));
        assert!(handle.lock().bus.gpio().unwrap().pad(0));
    }
}
