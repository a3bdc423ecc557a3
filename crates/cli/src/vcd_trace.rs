// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use chiselv_sim::{Signals, SimulationObserver};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use vcd::{IdCode, TimescaleUnit, Value, Writer};

/// Dumps GPIO pads/direction and the UART wires as a VCD waveform, one
/// timestamp per clock cycle that changed something.
pub struct VcdObserver {
    state: Mutex<VcdState>,
    ids: VcdIds,
    gpio_width: u32,
}

struct VcdIds {
    gpio_dir: IdCode,
    gpio_pads: IdCode,
    uart_tx: IdCode,
    uart_rx: IdCode,
}

struct VcdState {
    writer: Writer<BufWriter<File>>,
    last_time: u64,
}

impl VcdObserver {
    /// `clock_hz` sets the timescale so one timestamp is one clock cycle.
    pub fn new(path: &Path, clock_hz: u32, gpio_width: u32) -> anyhow::Result<Self> {
        let file = File::create(path)?;
        let mut writer = Writer::new(BufWriter::new(file));
        let gpio_width = gpio_width.clamp(1, 32);

        // 25 MHz gives 40 ns per cycle.
        let period_ns = (1_000_000_000 / clock_hz.max(1)).max(1);
        writer.timescale(period_ns, TimescaleUnit::NS)?;
        writer.add_module("chiselv")?;

        writer.add_module("gpio0")?;
        let gpio_dir = writer.add_wire(gpio_width, "dir")?;
        let gpio_pads = writer.add_wire(gpio_width, "pads")?;
        writer.upscope()?;

        writer.add_module("uart0")?;
        let uart_tx = writer.add_wire(1, "tx")?;
        let uart_rx = writer.add_wire(1, "rx")?;
        writer.upscope()?;

        writer.upscope()?;
        writer.enddefinitions()?;

        writer.timestamp(0)?;
        writer.change_vector(gpio_dir, u32_to_vec(0, gpio_width))?;
        writer.change_vector(gpio_pads, u32_to_vec(0, gpio_width))?;
        writer.change_scalar(uart_tx, Value::V1)?;
        writer.change_scalar(uart_rx, Value::V1)?;

        Ok(Self {
            state: Mutex::new(VcdState {
                writer,
                last_time: 0,
            }),
            ids: VcdIds {
                gpio_dir,
                gpio_pads,
                uart_tx,
                uart_rx,
            },
            gpio_width,
        })
    }

    fn dump(&self, cycle: u64, signals: &Signals) -> std::io::Result<()> {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(e) => e.into_inner(),
        };
        if cycle > state.last_time {
            state.writer.timestamp(cycle)?;
            state.last_time = cycle;
        }
        let w = self.gpio_width;
        state
            .writer
            .change_vector(self.ids.gpio_dir, u32_to_vec(signals.gpio_dir, w))?;
        state
            .writer
            .change_vector(self.ids.gpio_pads, u32_to_vec(signals.gpio_pads, w))?;
        state
            .writer
            .change_scalar(self.ids.uart_tx, level(signals.uart_tx))?;
        state
            .writer
            .change_scalar(self.ids.uart_rx, level(signals.uart_rx))?;
        Ok(())
    }
}

fn level(high: bool) -> Value {
    if high {
        Value::V1
    } else {
        Value::V0
    }
}

// MSB first
fn u32_to_vec(val: u32, width: u32) -> Vec<Value> {
    (0..width)
        .rev()
        .map(|i| level((val >> i) & 1 == 1))
        .collect()
}

impl core::fmt::Debug for VcdObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "VcdObserver")
    }
}

impl SimulationObserver for VcdObserver {
    fn on_signals(&self, cycle: u64, signals: &Signals) {
        if let Err(e) = self.dump(cycle, signals) {
            tracing::warn!("VCD write failed at cycle {}: {}", cycle, e);
        }
    }

    fn on_simulation_stop(&self, cycle: u64) {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(e) => e.into_inner(),
        };
        if cycle > state.last_time {
            let _ = state.writer.timestamp(cycle);
            state.last_time = cycle;
        }
        if let Err(e) = state.writer.flush() {
            tracing::warn!("VCD flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_is_msb_first() {
        assert_eq!(
            u32_to_vec(0b101, 4),
            vec![Value::V0, Value::V1, Value::V0, Value::V1]
        );
    }

    #[test]
    fn test_writes_changes() {
        let path = std::env::temp_dir().join(format!("chiselv-vcd-{}.vcd", std::process::id()));
        let vcd = VcdObserver::new(&path, 25_000_000, 8).unwrap();
        vcd.on_signals(
            12,
            &Signals {
                gpio_dir: 0x7F,
                gpio_pads: 0x01,
                uart_tx: false,
                uart_rx: true,
            },
        );
        vcd.on_simulation_stop(40);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("$timescale 40 ns $end") || text.contains("$timescale 40ns $end"));
        assert!(text.contains("#12"));
        assert!(text.contains("b01111111"));
        assert!(text.contains("#40"));
        let _ = std::fs::remove_file(&path);
    }
}
