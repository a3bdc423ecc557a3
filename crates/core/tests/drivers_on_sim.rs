// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The HAL drivers running unmodified against the SoC model.

use chiselv_config::BoardDescriptor;
use chiselv_hal::map::{GPIO0_BASE, GPIO_VAL, UART0_BASE, UART_TX};
use chiselv_hal::{Console, Gpio, Level, PinMode, SysCon, Timer, Uart, UartStatus};
use chiselv_sim::soc::{Soc, SocHandle};
use chiselv_sim::StopReason;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn fast_board() -> BoardDescriptor {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    BoardDescriptor::from_file(root.join("../../configs/boards/chiselv-fast.yaml")).unwrap()
}

fn with_capture(mut soc: Soc) -> (SocHandle, Arc<Mutex<Vec<u8>>>) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    soc.host_rx.set_sink(Some(sink.clone()), false);
    (soc.into_handle(), sink)
}

#[test]
fn test_uart_init_programs_divisor_12() {
    let handle = Soc::reference().into_handle();
    let mut uart = Uart::new(handle.clone());
    uart.init();
    assert_eq!(uart.clock_divisor(), 12);
    assert_eq!(handle.lock().bus.uart().unwrap().bit_cycles(), 208);
}

#[test]
fn test_put_char_reaches_host_as_crlf() {
    let (handle, sink) = with_capture(Soc::reference());
    let mut uart = Uart::new(handle.clone());
    uart.init();

    uart.put_char(b'A');
    uart.put_char(b'\n');
    uart.flush();
    handle.lock().drain(10_000);

    assert_eq!(*sink.lock().unwrap(), b"A\r\n");
}

#[test]
fn test_tx_fifo_back_pressure() {
    let (handle, sink) = with_capture(Soc::reference());
    let mut console = Console::new(Uart::new(handle.clone()));
    console.uart().init();

    // Longer than the 16 byte FIFO, so put_char has to wait on TX_FULL.
    let line = "the quick brown fox jumps over the lazy dog";
    console.put_line(line);
    console.uart().flush();
    handle.lock().drain(10_000);

    let expected = format!("{}\r\n", line);
    assert_eq!(*sink.lock().unwrap(), expected.as_bytes());
}

#[test]
fn test_writes_before_init_use_fastest_rate() {
    let (handle, sink) = with_capture(Soc::reference());
    let mut regs = handle.clone();
    chiselv_hal::RegisterAccess::write32(&mut regs, UART0_BASE + UART_TX, b'x' as u32);
    handle.lock().drain(10_000);
    // Divisor 0 shifts 16 cycles per bit; the host at 115200 cannot follow.
    assert_ne!(*sink.lock().unwrap(), b"x");
}

#[test]
fn test_console_reads_typed_line() {
    let (handle, sink) = with_capture(Soc::reference());
    handle.lock().type_input(b"hi\r");

    let mut console = Console::new(Uart::new(handle.clone()));
    console.uart().init();
    let mut buf = [0u8; 16];
    let len = console.read_line(&mut buf).unwrap();
    console.uart().flush();
    handle.lock().drain(10_000);

    assert_eq!(&buf[..len], b"hi");
    assert_eq!(*sink.lock().unwrap(), b"hi\r\n");
}

#[test]
fn test_rx_status_follows_fifo() {
    let handle = Soc::reference().into_handle();
    handle.lock().type_input(b"k");

    let mut uart = Uart::new(handle.clone());
    uart.init();
    assert!(uart.is_rx_empty());
    assert_eq!(uart.get_char(), b'k');
    assert!(uart.status().contains(UartStatus::RX_EMPTY));
}

#[test]
fn test_sleep_ms_waits_and_resets_counter() {
    let handle = Soc::from_config(&fast_board()).unwrap().into_handle();
    let mut timer = Timer::new(handle.clone());

    let start = handle.lock().cycle();
    timer.sleep_ms(500);
    let elapsed = handle.lock().cycle() - start;

    assert!(elapsed >= 500 * 64, "slept only {} cycles", elapsed);
    assert_eq!(handle.lock().bus.timer().unwrap().counter(), 0);
}

#[test]
fn test_timer_counts_up() {
    let handle = Soc::from_config(&fast_board()).unwrap().into_handle();
    let mut timer = Timer::new(handle.clone());
    timer.set(10);
    timer.wait_until(12);
    assert!(timer.get() > 12);
}

#[test]
fn test_gpio_outputs_drive_pads() {
    let handle = Soc::reference().into_handle();
    let mut gpio = Gpio::new(handle.clone());

    gpio.set_direction(0x7F);
    gpio.digital_write(0, Level::High);
    gpio.digital_write(1, Level::High);
    gpio.digital_write(1, Level::Low);
    gpio.digital_write(2, Level::High);

    let soc = handle.lock();
    let pads = soc.bus.gpio().unwrap().pads();
    assert_eq!(pads, 0b101);
    assert_eq!(soc.bus.peek_u32(GPIO0_BASE + GPIO_VAL).unwrap(), 0b101);
}

#[test]
fn test_gpio_input_pin_reads_external_level() {
    let handle = Soc::reference().into_handle();
    let mut gpio = Gpio::new(handle.clone());
    gpio.set_pin_mode(7, PinMode::Input);
    gpio.set_pin_mode(3, PinMode::Output);

    assert_eq!(gpio.digital_read(7), Level::Low);
    handle.lock().set_gpio_input(7, true);
    assert_eq!(gpio.digital_read(7), Level::High);

    let level = gpio.digital_read(7);
    gpio.digital_write(3, level);
    assert!(handle.lock().bus.gpio().unwrap().pad(3));
}

#[test]
fn test_syscon_info_matches_board() {
    let handle = Soc::from_config(&fast_board()).unwrap().into_handle();
    let info = SysCon::new(handle).info();
    assert_eq!(info.clock_hz, 25_000_000);
    assert!(info.has_uart0 && info.has_gpio0 && info.has_timer0);
    assert!(!info.has_pwm0);
    assert_eq!(info.gpio_count, 8);
    assert_eq!(info.rom_size, 64 * 1024);
}

#[test]
fn test_signal_exit_ends_run() {
    let handle = Soc::reference().into_handle();
    let outcome = handle.run(|regs| {
        let mut syscon = SysCon::new(regs);
        syscon.signal_exit(0);
        unreachable!("exit write returned");
    });
    assert_eq!(outcome.stop_reason, StopReason::Exit);
    assert_eq!(outcome.exit_code, Some(0));
}

#[test]
fn test_uart_byte_limit_stops_chatty_program() {
    let mut soc = Soc::reference();
    soc.limits.max_uart_bytes = Some(3);
    soc.host_rx.set_sink(None, false);
    let handle = soc.into_handle();

    let outcome = handle.run(|regs| {
        let mut uart = Uart::new(regs);
        uart.init();
        loop {
            uart.put_char(b'.');
        }
    });
    assert_eq!(outcome.stop_reason, StopReason::MaxUartBytes);
    assert_eq!(handle.lock().host_rx.received(), 3);
}
