// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! 8N1 serial framing at the wire level.
//!
//! A frame is one start bit (low), eight data bits LSB first and one stop
//! bit (high). Lines idle high. Both the UART model and the host side of the
//! link use the same encoder and decoder, each with its own bit period.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub const IDLE: bool = true;

const FRAME_BITS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("stop bit was low")]
    Framing,
}

#[derive(Debug, Clone, Copy)]
struct Shift {
    frame: u16,
    bit: u8,
    remaining: u32,
    bit_cycles: u32,
}

/// Shifts bytes out onto a line, one cycle per `tick`.
#[derive(Debug, Default, Clone)]
pub struct FrameEncoder {
    shift: Option<Shift>,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.shift.is_some()
    }

    /// Start a frame. Must only be called when idle; a frame in flight is
    /// replaced.
    pub fn load(&mut self, byte: u8, bit_cycles: u32) {
        let bit_cycles = bit_cycles.max(1);
        self.shift = Some(Shift {
            frame: ((byte as u16) << 1) | (1 << 9),
            bit: 0,
            remaining: bit_cycles,
            bit_cycles,
        });
    }

    /// Line level for the current cycle, then advance.
    pub fn tick(&mut self) -> bool {
        let Some(shift) = self.shift.as_mut() else {
            return IDLE;
        };
        let level = (shift.frame >> shift.bit) & 1 == 1;
        shift.remaining -= 1;
        if shift.remaining == 0 {
            shift.bit += 1;
            shift.remaining = shift.bit_cycles;
            if shift.bit == FRAME_BITS {
                self.shift = None;
            }
        }
        level
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Idle,
    /// Waiting for the middle of the start bit.
    Start { countdown: u32 },
    /// `bit` counts data bits received; 8 means the stop bit is next.
    Data { bit: u8, byte: u8, countdown: u32 },
}

/// Recovers bytes from a line sampled once per cycle.
///
/// A falling edge starts a frame. Every bit is sampled once, in its middle,
/// so the decoder tolerates a few percent of baud mismatch with the sender.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    prev: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Idle,
            prev: IDLE,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Idle
    }

    pub fn sample(&mut self, level: bool, bit_cycles: u32) -> Option<Result<u8, FrameError>> {
        let bit_cycles = bit_cycles.max(1);
        let prev = std::mem::replace(&mut self.prev, level);
        match self.state {
            DecodeState::Idle => {
                if prev && !level {
                    let countdown = bit_cycles / 2;
                    if countdown == 0 {
                        self.state = DecodeState::Data {
                            bit: 0,
                            byte: 0,
                            countdown: bit_cycles,
                        };
                    } else {
                        self.state = DecodeState::Start { countdown };
                    }
                }
                None
            }
            DecodeState::Start { countdown } => {
                let countdown = countdown - 1;
                if countdown > 0 {
                    self.state = DecodeState::Start { countdown };
                } else if level {
                    // Glitch shorter than half a bit.
                    self.state = DecodeState::Idle;
                } else {
                    self.state = DecodeState::Data {
                        bit: 0,
                        byte: 0,
                        countdown: bit_cycles,
                    };
                }
                None
            }
            DecodeState::Data {
                bit,
                byte,
                countdown,
            } => {
                let countdown = countdown - 1;
                if countdown > 0 {
                    self.state = DecodeState::Data {
                        bit,
                        byte,
                        countdown,
                    };
                    return None;
                }
                if bit == 8 {
                    self.state = DecodeState::Idle;
                    return Some(if level {
                        Ok(byte)
                    } else {
                        Err(FrameError::Framing)
                    });
                }
                self.state = DecodeState::Data {
                    bit: bit + 1,
                    byte: byte | ((level as u8) << bit),
                    countdown: bit_cycles,
                };
                None
            }
        }
    }
}

/// Host side transmitter that types bytes into the device's RX line.
#[derive(Debug)]
pub struct LineDriver {
    queue: VecDeque<u8>,
    encoder: FrameEncoder,
    bit_cycles: u32,
    start_cycle: u64,
}

impl LineDriver {
    pub fn new(bit_cycles: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            encoder: FrameEncoder::new(),
            bit_cycles,
            start_cycle: 0,
        }
    }

    pub fn bit_cycles(&self) -> u32 {
        self.bit_cycles
    }

    /// Hold the line idle until `cycle`.
    pub fn set_start_cycle(&mut self, cycle: u64) {
        self.start_cycle = cycle;
    }

    pub fn queue(&mut self, bytes: &[u8]) {
        self.queue.extend(bytes.iter().copied());
    }

    /// Bytes not yet fully on the wire.
    pub fn pending(&self) -> usize {
        self.queue.len() + self.encoder.is_busy() as usize
    }

    pub fn tick(&mut self, cycle: u64) -> bool {
        if cycle >= self.start_cycle && !self.encoder.is_busy() {
            if let Some(byte) = self.queue.pop_front() {
                self.encoder.load(byte, self.bit_cycles);
            }
        }
        self.encoder.tick()
    }
}

/// Host side receiver watching the device's TX line.
#[derive(Debug)]
pub struct LineMonitor {
    decoder: FrameDecoder,
    bit_cycles: u32,
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
    received: u64,
    framing_errors: u64,
}

impl LineMonitor {
    pub fn new(bit_cycles: u32) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            bit_cycles,
            sink: None,
            echo_stdout: true,
            received: 0,
            framing_errors: 0,
        }
    }

    /// Capture received bytes into `sink`.
    ///
    /// When `echo_stdout` is false, bytes are no longer printed to stdout.
    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }

    pub fn is_idle(&self) -> bool {
        self.decoder.is_idle()
    }

    pub fn sample(&mut self, level: bool) -> Option<u8> {
        match self.decoder.sample(level, self.bit_cycles)? {
            Ok(byte) => {
                self.received += 1;
                if let Some(sink) = &self.sink {
                    if let Ok(mut guard) = sink.lock() {
                        guard.push(byte);
                    }
                }
                if self.echo_stdout {
                    #[allow(unused_must_use)]
                    {
                        print!("{}", byte as char);
                        io::stdout().flush();
                    }
                }
                Some(byte)
            }
            Err(e) => {
                self.framing_errors += 1;
                tracing::warn!("Host UART monitor: {}", e);
                None
            }
        }
    }
}
