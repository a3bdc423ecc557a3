// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimulationObserver;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Counts register traffic and simulated cycles for one run.
#[derive(Debug)]
pub struct PerformanceMetrics {
    read_count: AtomicU64,
    write_count: AtomicU64,
    cycle_count: AtomicU64,
    accesses_by_address: Mutex<HashMap<u32, u64>>,
    start_time: Mutex<Instant>,
    elapsed: Mutex<Option<Duration>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsReport {
    pub register_reads: u64,
    pub register_writes: u64,
    pub cycles: u64,
    pub wall_time_ms: u128,
    pub cycles_per_second: f64,
    /// Most accessed register first.
    pub hottest_registers: Vec<(String, u64)>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            cycle_count: AtomicU64::new(0),
            accesses_by_address: Mutex::new(HashMap::new()),
            start_time: Mutex::new(Instant::now()),
            elapsed: Mutex::new(None),
        }
    }

    pub fn reset(&self) {
        self.read_count.store(0, Ordering::SeqCst);
        self.write_count.store(0, Ordering::SeqCst);
        self.cycle_count.store(0, Ordering::SeqCst);
        if let Ok(mut m) = self.accesses_by_address.lock() {
            m.clear();
        }
        if let Ok(mut e) = self.elapsed.lock() {
            *e = None;
        }
    }

    pub fn get_reads(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn get_writes(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    pub fn get_accesses(&self, addr: u32) -> u64 {
        self.accesses_by_address
            .lock()
            .ok()
            .and_then(|m| m.get(&addr).copied())
            .unwrap_or(0)
    }

    fn elapsed(&self) -> Duration {
        if let Some(e) = self.elapsed.lock().ok().and_then(|e| *e) {
            return e;
        }
        self.start_time
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Simulated cycles per wall-clock second.
    pub fn get_cps(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_cycles() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn report(&self, top: usize) -> MetricsReport {
        let mut hottest: Vec<(u32, u64)> = self
            .accesses_by_address
            .lock()
            .map(|m| m.iter().map(|(a, n)| (*a, *n)).collect())
            .unwrap_or_default();
        hottest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hottest.truncate(top);

        MetricsReport {
            register_reads: self.get_reads(),
            register_writes: self.get_writes(),
            cycles: self.get_cycles(),
            wall_time_ms: self.elapsed().as_millis(),
            cycles_per_second: self.get_cps(),
            hottest_registers: hottest
                .into_iter()
                .map(|(addr, n)| (format!("{:#010x}", addr), n))
                .collect(),
        }
    }

    fn count(&self, addr: u32) {
        if let Ok(mut m) = self.accesses_by_address.lock() {
            *m.entry(addr).or_insert(0) += 1;
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_simulation_start(&self) {
        if let Ok(mut t) = self.start_time.lock() {
            *t = Instant::now();
        }
    }

    fn on_simulation_stop(&self, cycle: u64) {
        self.cycle_count.store(cycle, Ordering::SeqCst);
        let elapsed = self.elapsed();
        if let Ok(mut e) = self.elapsed.lock() {
            *e = Some(elapsed);
        }
    }

    fn on_register_read(&self, _cycle: u64, addr: u32, _value: u32) {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.count(addr);
    }

    fn on_register_write(&self, _cycle: u64, addr: u32, _value: u32) {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.count(addr);
    }
}
