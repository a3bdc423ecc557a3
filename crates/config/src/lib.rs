// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

/// Built-in ChiselV reference board.
pub const REFERENCE_BOARD_YAML: &str = include_str!("../../../configs/boards/chiselv.yaml");

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_cycles_per_access() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryLayout {
    #[serde(default)]
    pub boot_addr: u32,
    pub rom_size: String, // e.g. "64KiB"
    pub ram_size: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "uart", "gpio", "timer", "syscon"
    pub base_address: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

impl PeripheralConfig {
    /// Register window size; 4KiB when not given.
    pub fn window_size(&self) -> Result<u32> {
        match &self.size {
            Some(size) => {
                let bytes = parse_size(size)
                    .with_context(|| format!("Invalid size for peripheral '{}'", self.id))?;
                u32::try_from(bytes)
                    .with_context(|| format!("Size of peripheral '{}' exceeds 4GiB", self.id))
            }
            None => Ok(0x1000),
        }
    }

    pub fn config_u32(&self, key: &str) -> Result<Option<u32>> {
        let Some(value) = self.config.get(key) else {
            return Ok(None);
        };
        let n = value.as_u64().ok_or_else(|| {
            anyhow::anyhow!(
                "Field 'config.{}' of peripheral '{}' must be an unsigned integer",
                key,
                self.id
            )
        })?;
        u32::try_from(n)
            .map(Some)
            .with_context(|| format!("Field 'config.{}' of '{}' is out of range", key, self.id))
    }

    pub fn config_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.config.get(key) {
            None => Ok(None),
            Some(value) => value.as_bool().map(Some).ok_or_else(|| {
                anyhow::anyhow!(
                    "Field 'config.{}' of peripheral '{}' must be a boolean",
                    key,
                    self.id
                )
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub clock_hz: u32,
    /// Clock cycles charged for each register access made by a host program.
    #[serde(default = "default_cycles_per_access")]
    pub cycles_per_access: u32,
    pub memory: MemoryLayout,
    pub peripherals: Vec<PeripheralConfig>,
}

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read board descriptor at {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid board descriptor {:?}", path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let board: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Board Descriptor YAML")?;
        board.validate()?;
        Ok(board)
    }

    /// The ChiselV reference board (25 MHz, UART0/GPIO0/TIMER0).
    pub fn reference() -> Result<Self> {
        Self::from_yaml(REFERENCE_BOARD_YAML).context("Built-in reference board is invalid")
    }

    pub fn peripheral(&self, id: &str) -> Option<&PeripheralConfig> {
        self.peripherals.iter().find(|p| p.id == id)
    }

    pub fn peripherals_of_type<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = &'a PeripheralConfig> + 'a {
        self.peripherals.iter().filter(move |p| p.r#type == kind)
    }

    pub fn rom_bytes(&self) -> Result<u32> {
        size_u32(&self.memory.rom_size).context("Invalid 'memory.rom_size'")
    }

    pub fn ram_bytes(&self) -> Result<u32> {
        size_u32(&self.memory.ram_size).context("Invalid 'memory.ram_size'")
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }
        if self.clock_hz == 0 {
            anyhow::bail!("Field 'clock_hz' must be greater than zero");
        }
        if self.cycles_per_access == 0 {
            anyhow::bail!("Field 'cycles_per_access' must be greater than zero");
        }
        self.rom_bytes()?;
        self.ram_bytes()?;

        let mut ids = HashSet::new();
        let mut windows = Vec::new();
        for p in &self.peripherals {
            if !ids.insert(p.id.as_str()) {
                anyhow::bail!("Duplicate peripheral id '{}'", p.id);
            }
            if p.base_address % 4 != 0 {
                anyhow::bail!(
                    "Peripheral '{}' base address {:#x} is not word aligned",
                    p.id,
                    p.base_address
                );
            }
            let size = p.window_size()?;
            let start = p.base_address as u64;
            let end = start + size as u64;
            for (other, other_start, other_end) in &windows {
                if start < *other_end && *other_start < end {
                    anyhow::bail!(
                        "Peripheral '{}' [{:#x}, {:#x}) overlaps '{}'",
                        p.id,
                        start,
                        end,
                        other
                    );
                }
            }
            windows.push((p.id.as_str(), start, end));
        }

        Ok(())
    }
}

fn size_u32(size: &str) -> Result<u32> {
    let bytes = parse_size(size)?;
    u32::try_from(bytes).with_context(|| format!("Size '{}' exceeds 4GiB", size))
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

/// Host programs the runner knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Program {
    Blink,
    Echo,
}

impl FromStr for Program {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blink" | "blink-led" => Ok(Self::Blink),
            "echo" | "hello-uart" => Ok(Self::Echo),
            _ => Err(format!(
                "unsupported program '{}'; supported: blink, echo",
                value
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    pub program: Program,
    /// Board descriptor path, relative to the script. Reference board when absent.
    #[serde(default)]
    pub board: Option<String>,
    /// Bytes typed into UART0 by the host.
    #[serde(default)]
    pub uart_input: String,
    /// Send EOT (0x04) after the input, which ends the echo program.
    #[serde(default = "default_true")]
    pub hangup: bool,
    #[serde(default)]
    pub input_delay_cycles: Option<u64>,
    /// Blink loop iterations before the program signals exit.
    #[serde(default)]
    pub rounds: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub max_cycles: u64,
    #[serde(default)]
    pub max_uart_bytes: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before simulation started (e.g. script parse/validation error).
    ConfigError,
    /// The program wrote the SYSCON termination register.
    Exit,
    /// The program returned without signalling exit.
    Returned,
    MaxCycles,
    MaxUartBytes,
    MemoryViolation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GpioLevelDetails {
    pub pin: u8,
    pub high: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GpioLevelAssertion {
    pub gpio_level: GpioLevelDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueDetails {
    pub address: u32,
    pub expected_value: u32,
    #[serde(default)]
    pub mask: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueAssertion {
    pub register_value: RegisterValueDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    UartContains(UartContainsAssertion),
    ExpectedStopReason(StopReasonAssertion),
    GpioLevel(GpioLevelAssertion),
    RegisterValue(RegisterValueAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.limits.max_cycles == 0 {
            anyhow::bail!("Limit 'max_cycles' must be greater than zero");
        }

        if matches!(self.inputs.board.as_deref(), Some(b) if b.trim().is_empty()) {
            anyhow::bail!("Input 'board' path cannot be empty");
        }

        for assertion in &self.assertions {
            if let TestAssertion::GpioLevel(a) = assertion {
                if a.gpio_level.pin > 31 {
                    anyhow::bail!("gpio_level pin {} is out of range 0..=31", a.gpio_level.pin);
                }
            }
        }

        Ok(())
    }
}
