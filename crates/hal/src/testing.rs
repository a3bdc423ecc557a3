// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::RegisterAccess;
use std::collections::{HashMap, VecDeque};

/// Register file for driver tests.
///
/// Reads return scripted values first (one per read, in order), then the
/// last stored word. Every write is logged and stored.
#[derive(Debug, Default)]
pub struct FakeRegisters {
    store: HashMap<u32, u32>,
    scripted: HashMap<u32, VecDeque<u32>>,
    reads: Vec<u32>,
    writes: Vec<(u32, u32)>,
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poke(&mut self, addr: u32, value: u32) {
        self.store.insert(addr, value);
    }

    pub fn peek(&self, addr: u32) -> u32 {
        self.store.get(&addr).copied().unwrap_or(0)
    }

    /// Queue values returned by the next reads of `addr`.
    pub fn script(&mut self, addr: u32, values: &[u32]) {
        self.scripted
            .entry(addr)
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn reads_of(&self, addr: u32) -> usize {
        self.reads.iter().filter(|&&a| a == addr).count()
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.writes.clone()
    }

    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl RegisterAccess for FakeRegisters {
    fn read32(&mut self, addr: u32) -> u32 {
        self.reads.push(addr);
        if let Some(value) = self.scripted.get_mut(&addr).and_then(|q| q.pop_front()) {
            return value;
        }
        self.peek(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.writes.push((addr, value));
        self.store.insert(addr, value);
    }
}
