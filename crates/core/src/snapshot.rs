// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BusSnapshot {
    pub cycle: u64,
    pub peripherals: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SocSnapshot {
    pub bus: BusSnapshot,
    pub uart_rx_pending: usize,
    pub uart_tx_received: u64,
    pub exit_code: Option<u32>,
}
