// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod programs;
mod vcd_trace;

use clap::{Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use chiselv_config::{
    BoardDescriptor, Program, StopReason, TestAssertion, TestLimits, TestScript,
    REFERENCE_BOARD_YAML,
};
use chiselv_hal::{SysCon, Uart};
use chiselv_sim::metrics::PerformanceMetrics;
use chiselv_sim::soc::{RunOutcome, Soc, DEFAULT_INPUT_DELAY_CYCLES};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

/// The echo program prints a few hundred header bytes before it polls RX;
/// typing earlier would overrun the 16 byte receive FIFO.
const ECHO_INPUT_DELAY_CYCLES: u64 = 2_000_000;

/// Upper bound on the cycles spent letting the serial link settle after a run.
const DRAIN_CYCLES: u64 = 1_000_000;

const HOTTEST_REGISTERS: usize = 8;

#[derive(Parser, Debug)]
#[command(author, version, about = "ChiselV SoC simulator", long_about = None)]
struct Cli {
    /// Log every register access
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot the SoC and print what SYSCON reports.
    Info(InfoArgs),

    /// Run a demo program interactively.
    Run(RunArgs),

    /// Deterministic, CI-friendly runner mode driven by a test script (YAML).
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Board descriptor (YAML); the built-in reference board when absent
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Program to run (blink, echo)
    #[arg(short, long)]
    program: Program,

    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Text typed into UART0 (`\r`, `\n`, `\t` and `\\` escapes allowed).
    /// EOT follows it, which ends the echo program.
    #[arg(short, long)]
    input: Option<String>,

    /// Cycles before the host starts typing
    #[arg(long)]
    input_delay: Option<u64>,

    /// Blink rounds; 0 blinks forever
    #[arg(long, default_value = "1")]
    rounds: u32,

    #[arg(long, default_value = "100000000")]
    max_cycles: u64,

    /// Write a VCD waveform of the GPIO pads and UART wires
    #[arg(long)]
    vcd: Option<PathBuf>,

    /// Write the SoC state (JSON) after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the run outcome as JSON
    #[arg(long)]
    json: bool,

    /// Do not echo UART output to stdout
    #[arg(long)]
    no_uart_stdout: bool,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Override the board descriptor named by the script
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Override max cycles limit
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Override max UART bytes limit
    #[arg(long)]
    max_uart_bytes: Option<u64>,

    /// Disable UART stdout echo (still captured for assertions/artifacts)
    #[arg(long)]
    no_uart_stdout: bool,

    /// Directory to write test artifacts (result.json, uart.log, junit.xml)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Optional path to write a JUnit XML report for CI systems
    #[arg(long)]
    junit: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    program: Option<Program>,
    cycles: u64,
    stop_reason: StopReason,
    stop_reason_details: StopReasonDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<u32>,
    limits: Option<TestLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    board_hash: String,
    uart_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<chiselv_sim::metrics::MetricsReport>,
    config: TestConfig,
}

#[derive(Debug, Serialize, Clone)]
struct StopReasonDetails {
    triggered_stop_condition: StopReason,
    triggered_limit: Option<NamedU64>,
    observed: Option<NamedU64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fault: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
struct NamedU64 {
    name: String,
    value: u64,
}

#[derive(Debug, Serialize, Clone)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
}

#[derive(Debug, Serialize, Clone)]
struct TestConfig {
    board: Option<PathBuf>,
    script: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries UART output and JSON.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info(args) => run_info(args),
        Commands::Run(args) => run_program(args),
        Commands::Test(args) => run_test(args),
    }
}

/// Board descriptor plus the bytes it was parsed from, for hashing.
fn load_board(path: Option<&Path>) -> anyhow::Result<(BoardDescriptor, Vec<u8>)> {
    match path {
        Some(path) => {
            info!("Loading board descriptor: {:?}", path);
            let board = BoardDescriptor::from_file(path)?;
            let bytes = std::fs::read(path)?;
            Ok((board, bytes))
        }
        None => {
            info!("Using the reference board");
            Ok((
                BoardDescriptor::reference()?,
                REFERENCE_BOARD_YAML.as_bytes().to_vec(),
            ))
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn input_delay(program: Program, explicit: Option<u64>) -> u64 {
    explicit.unwrap_or(match program {
        Program::Echo => ECHO_INPUT_DELAY_CYCLES,
        Program::Blink => DEFAULT_INPUT_DELAY_CYCLES,
    })
}

/// Expand the escapes a shell argument cannot carry literally.
fn unescape_input(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('r') => out.push(b'\r'),
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}

fn run_info(args: InfoArgs) -> ExitCode {
    let (board, _) = match load_board(args.board.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let mut soc = match Soc::from_config(&board) {
        Ok(soc) => soc,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    soc.host_rx.set_sink(None, false);
    let handle = soc.into_handle();

    let mut probe = None;
    let outcome = handle.run(|regs| {
        let info = SysCon::new(regs.clone()).info();
        let mut uart = Uart::new(regs);
        uart.init();
        probe = Some((info, uart.clock_divisor()));
    });

    let Some((info, divisor)) = probe else {
        error!("SoC stopped while probing: {:?}", outcome.stop_reason);
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    };

    if args.json {
        let doc = serde_json::json!({
            "board": board.name,
            "clock_hz": info.clock_hz,
            "has_uart0": info.has_uart0,
            "has_gpio0": info.has_gpio0,
            "has_pwm0": info.has_pwm0,
            "has_timer0": info.has_timer0,
            "gpio_count": info.gpio_count,
            "boot_addr": info.boot_addr,
            "rom_size": info.rom_size,
            "ram_size": info.ram_size,
            "uart0_divisor": divisor,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                error!("Failed to encode info: {}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        }
    } else {
        let mut text = String::new();
        // Writing into a String cannot fail.
        let _ = programs::write_header(&mut text, &info);
        print!("{}", text);
        println!("uart0 divisor: {}", divisor);
    }
    ExitCode::from(EXIT_PASS)
}

fn run_program(args: RunArgs) -> ExitCode {
    let (board, _) = match load_board(args.board.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let mut soc = match Soc::from_config(&board) {
        Ok(soc) => soc,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    soc.host_rx.set_sink(None, !args.no_uart_stdout);
    soc.host_tx
        .set_start_cycle(input_delay(args.program, args.input_delay));
    if let Some(input) = &args.input {
        soc.type_input(&unescape_input(input));
        soc.type_input(&[programs::EOT]);
    }
    soc.limits.max_cycles = Some(args.max_cycles);

    let metrics = Arc::new(PerformanceMetrics::new());
    soc.add_observer(metrics.clone());

    if let Some(path) = &args.vcd {
        let pins = soc.bus.gpio().map(|g| g.pins()).unwrap_or(32);
        match vcd_trace::VcdObserver::new(path, soc.clock_hz(), pins) {
            Ok(vcd) => {
                info!("Writing VCD trace to {:?}", path);
                soc.add_observer(Arc::new(vcd));
            }
            Err(e) => {
                error!("Failed to create VCD file {:?}: {:#}", path, e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        }
    }

    info!("Running {:?} on board '{}'", args.program, board.name);
    let handle = soc.into_handle();
    let program = args.program;
    let rounds = args.rounds;
    let outcome = handle.run(move |regs| programs::run(program, regs, rounds));
    handle.lock().drain(DRAIN_CYCLES);

    info!("Register reads: {}", metrics.get_reads());
    info!("Register writes: {}", metrics.get_writes());
    info!("Cycles: {}", outcome.cycles);
    info!("Average cycles/s: {:.2}", metrics.get_cps());

    if let Some(path) = &args.snapshot {
        let snapshot = handle.lock().snapshot();
        match std::fs::File::create(path) {
            Ok(f) => {
                if let Err(e) = serde_json::to_writer_pretty(f, &snapshot) {
                    error!("Failed to write snapshot {:?}: {}", path, e);
                }
            }
            Err(e) => error!("Failed to create snapshot {:?}: {}", path, e),
        }
    }

    if args.json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(s) => println!("{}", s),
            Err(e) => error!("Failed to encode outcome: {}", e),
        }
    }

    match outcome.stop_reason {
        StopReason::MemoryViolation => {
            error!(
                "Bus fault: {}",
                outcome.fault.as_deref().unwrap_or("unknown")
            );
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
        _ => ExitCode::from(EXIT_PASS),
    }
}

fn build_stop_reason_details(
    outcome: &RunOutcome,
    limits: &TestLimits,
    uart_bytes: u64,
) -> StopReasonDetails {
    let (triggered_limit, observed) = match outcome.stop_reason {
        StopReason::MaxCycles => (
            Some(NamedU64 {
                name: "max_cycles".to_string(),
                value: limits.max_cycles,
            }),
            Some(NamedU64 {
                name: "cycles".to_string(),
                value: outcome.cycles,
            }),
        ),
        StopReason::MaxUartBytes => (
            limits.max_uart_bytes.map(|v| NamedU64 {
                name: "max_uart_bytes".to_string(),
                value: v,
            }),
            Some(NamedU64 {
                name: "uart_bytes".to_string(),
                value: uart_bytes,
            }),
        ),
        StopReason::Exit => (
            None,
            outcome.exit_code.map(|code| NamedU64 {
                name: "exit_code".to_string(),
                value: code as u64,
            }),
        ),
        StopReason::Returned | StopReason::MemoryViolation | StopReason::ConfigError => {
            (None, None)
        }
    };

    StopReasonDetails {
        triggered_stop_condition: outcome.stop_reason,
        triggered_limit,
        observed,
        fault: outcome.fault.clone(),
    }
}

fn run_test(args: TestArgs) -> ExitCode {
    let script = match TestScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, None, None, None, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let limits = TestLimits {
        max_cycles: args.max_cycles.unwrap_or(script.limits.max_cycles),
        max_uart_bytes: args.max_uart_bytes.or(script.limits.max_uart_bytes),
    };

    // Guard against accidentally huge runs from CI misconfiguration.
    const MAX_ALLOWED_CYCLES: u64 = 2_000_000_000;
    if limits.max_cycles == 0 || limits.max_cycles > MAX_ALLOWED_CYCLES {
        let msg = format!(
            "max_cycles {} must be within 1..={}",
            limits.max_cycles, MAX_ALLOWED_CYCLES
        );
        error!("{}", msg);
        write_config_error_outputs(&args, None, None, Some(&limits), msg);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let board_path = args.board.clone().or_else(|| {
        script
            .inputs
            .board
            .as_deref()
            .map(|s| resolve_script_path(&args.script, s))
    });

    let (board, board_bytes) = match load_board(board_path.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, board_path.as_ref(), None, Some(&limits), msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut soc = match Soc::from_config(&board) {
        Ok(soc) => soc,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(
                &args,
                board_path.as_ref(),
                Some(&board_bytes),
                Some(&limits),
                msg,
            );
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    soc.host_rx
        .set_sink(Some(uart_tx.clone()), !args.no_uart_stdout);
    let program = script.inputs.program;
    soc.host_tx
        .set_start_cycle(input_delay(program, script.inputs.input_delay_cycles));
    soc.type_input(script.inputs.uart_input.as_bytes());
    if script.inputs.hangup {
        soc.type_input(&[programs::EOT]);
    }
    soc.limits.max_cycles = Some(limits.max_cycles);
    soc.limits.max_uart_bytes = limits.max_uart_bytes;

    let metrics = Arc::new(PerformanceMetrics::new());
    soc.add_observer(metrics.clone());

    let rounds = script.inputs.rounds.unwrap_or(1);
    info!("Running {:?} on board '{}'", program, board.name);
    let started = std::time::Instant::now();
    let handle = soc.into_handle();
    let outcome = handle.run(move |regs| programs::run(program, regs, rounds));
    if matches!(outcome.stop_reason, StopReason::Exit | StopReason::Returned) {
        handle.lock().drain(DRAIN_CYCLES);
    }
    let duration = started.elapsed();

    let soc = handle.lock();
    let uart_bytes = soc.host_rx.received();
    let uart_text = uart_tx
        .lock()
        .map(|g| String::from_utf8_lossy(&g).to_string())
        .unwrap_or_default();

    let assertions = evaluate_assertions(&script.assertions, &uart_text, &outcome, &soc);
    let stop_reason_details = build_stop_reason_details(&outcome, &limits, uart_bytes);
    let status = run_status(&outcome, &assertions);
    drop(soc);

    match status {
        "pass" => info!("Test passed: {:?}", outcome.stop_reason),
        "fail" => error!("Test failed: {:?}", outcome.stop_reason),
        _ => error!("Test errored: {:?}", outcome.stop_reason),
    }

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        program: Some(program),
        cycles: outcome.cycles,
        stop_reason: outcome.stop_reason,
        stop_reason_details,
        exit_code: outcome.exit_code,
        limits: Some(limits),
        message: outcome.fault.clone(),
        assertions,
        board_hash: sha256_hex(&board_bytes),
        uart_bytes,
        metrics: Some(metrics.report(HOTTEST_REGISTERS)),
        config: TestConfig {
            board: board_path,
            script: args.script.clone(),
        },
    };
    write_outputs(&args, &result, &uart_tx, duration);

    match status {
        "pass" => ExitCode::from(EXIT_PASS),
        "fail" => ExitCode::from(EXIT_ASSERT_FAIL),
        _ => ExitCode::from(EXIT_RUNTIME_ERROR),
    }
}

fn evaluate_assertions(
    assertions: &[TestAssertion],
    uart_text: &str,
    outcome: &RunOutcome,
    soc: &Soc,
) -> Vec<AssertionResult> {
    assertions
        .iter()
        .map(|assertion| {
            let passed = match assertion {
                TestAssertion::UartContains(a) => uart_text.contains(&a.uart_contains),
                TestAssertion::ExpectedStopReason(a) => {
                    a.expected_stop_reason == outcome.stop_reason
                }
                TestAssertion::GpioLevel(a) => soc
                    .bus
                    .gpio()
                    .map(|g| g.pad(a.gpio_level.pin as u32) == a.gpio_level.high)
                    .unwrap_or(false),
                TestAssertion::RegisterValue(a) => {
                    let r = &a.register_value;
                    let mask = r.mask.unwrap_or(u32::MAX);
                    match soc.bus.peek_u32(r.address) {
                        Ok(value) => value & mask == r.expected_value & mask,
                        Err(e) => {
                            error!("register_value assertion: {}", e);
                            false
                        }
                    }
                }
            };
            if !passed {
                error!("Assertion failed: {}", assertion_short_name(assertion));
            }
            AssertionResult {
                assertion: assertion.clone(),
                passed,
            }
        })
        .collect()
}

/// "pass", "fail" or "error".
fn run_status(outcome: &RunOutcome, assertions: &[AssertionResult]) -> &'static str {
    let expected_stop_matched = assertions
        .iter()
        .any(|a| matches!(a.assertion, TestAssertion::ExpectedStopReason(_)) && a.passed);
    let any_failed = assertions.iter().any(|a| !a.passed);

    match outcome.stop_reason {
        StopReason::MemoryViolation if !expected_stop_matched => "error",
        StopReason::MaxUartBytes if !expected_stop_matched => "fail",
        _ if any_failed => "fail",
        _ => "pass",
    }
}

fn write_outputs(
    args: &TestArgs,
    result: &TestResult,
    uart_tx: &Arc<Mutex<Vec<u8>>>,
    duration: std::time::Duration,
) {
    if let Some(output_dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            error!("Failed to create output directory {:?}: {}", output_dir, e);
        } else {
            let result_path = output_dir.join("result.json");
            match std::fs::File::create(&result_path) {
                Ok(f) => {
                    if let Err(e) = serde_json::to_writer_pretty(f, result) {
                        error!("Failed to write result.json: {}", e);
                    }
                }
                Err(e) => error!("Failed to create result.json: {}", e),
            }

            let uart_path = output_dir.join("uart.log");
            let bytes = uart_tx.lock().map(|g| g.clone()).unwrap_or_default();
            if let Err(e) = std::fs::write(&uart_path, bytes) {
                error!("Failed to write uart.log: {}", e);
            }

            let junit_path = output_dir.join("junit.xml");
            if let Err(e) = write_junit_xml(&junit_path, result, duration) {
                error!("Failed to write junit.xml: {}", e);
            }
        }
    }

    if let Some(junit_path) = &args.junit {
        if let Some(parent) = junit_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = write_junit_xml(junit_path, result, duration) {
            error!("Failed to write JUnit report {:?}: {}", junit_path, e);
        }
    }
}

fn write_config_error_outputs(
    args: &TestArgs,
    board_path: Option<&PathBuf>,
    board_bytes: Option<&[u8]>,
    limits: Option<&TestLimits>,
    message: String,
) {
    let outcome = RunOutcome {
        stop_reason: StopReason::ConfigError,
        cycles: 0,
        exit_code: None,
        fault: None,
    };
    let stop_reason_details = StopReasonDetails {
        triggered_stop_condition: StopReason::ConfigError,
        triggered_limit: None,
        observed: None,
        fault: None,
    };

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        program: None,
        cycles: outcome.cycles,
        stop_reason: outcome.stop_reason,
        stop_reason_details,
        exit_code: None,
        limits: limits.cloned(),
        message: Some(message),
        assertions: vec![],
        board_hash: board_bytes.map(sha256_hex).unwrap_or_default(),
        uart_bytes: 0,
        metrics: None,
        config: TestConfig {
            board: board_path.cloned(),
            script: args.script.clone(),
        },
    };

    let empty = Arc::new(Mutex::new(Vec::new()));
    write_outputs(args, &result, &empty, std::time::Duration::from_secs(0));
}

fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    script_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join(p)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn write_junit_xml(
    path: &Path,
    result: &TestResult,
    duration: std::time::Duration,
) -> std::io::Result<()> {
    let stop_reason = result.stop_reason;
    let details_of = &result.stop_reason_details;

    let mut details = String::new();
    details.push_str(&format!(
        "result_schema_version={}\n",
        RESULT_SCHEMA_VERSION
    ));
    details.push_str(&format!("stop_reason={:?}\n", stop_reason));
    if let Some(msg) = &result.message {
        details.push_str(&format!("message={}\n", msg));
    }
    if let Some(t) = &details_of.triggered_limit {
        details.push_str(&format!(
            "stop_reason_details.triggered_limit.{}={}\n",
            t.name, t.value
        ));
    }
    if let Some(o) = &details_of.observed {
        details.push_str(&format!(
            "stop_reason_details.observed.{}={}\n",
            o.name, o.value
        ));
    }
    details.push_str(&format!("cycles={}\n", result.cycles));
    details.push_str(&format!("uart_bytes={}\n", result.uart_bytes));
    if let Some(limits) = &result.limits {
        details.push_str("limits:\n");
        details.push_str(&format!("  - max_cycles={}\n", limits.max_cycles));
        if let Some(v) = limits.max_uart_bytes {
            details.push_str(&format!("  - max_uart_bytes={}\n", v));
        }
    }
    details.push_str(&format!("board_hash={}\n", result.board_hash));
    if let Some(board) = &result.config.board {
        details.push_str(&format!("board={}\n", board.display()));
    }
    details.push_str(&format!("script={}\n", result.config.script.display()));
    if !result.assertions.is_empty() {
        details.push_str("assertions:\n");
        for a in &result.assertions {
            details.push_str(&format!(
                "  - {}: {}\n",
                assertion_short_name(&a.assertion),
                a.passed
            ));
        }
    }

    let time_secs = duration.as_secs_f64();
    let any_assertion_failed = result.assertions.iter().any(|a| !a.passed);

    let mut tests: u64 = 0;
    let mut failures: u64 = 0;
    let mut errors: u64 = 0;
    let mut testcases = String::new();

    // The "run" testcase carries failures that are not tied to one assertion.
    tests += 1;
    testcases.push_str(&format!(
        "  <testcase classname=\"chiselv\" name=\"run\" time=\"{:.6}\">\n",
        time_secs
    ));
    if result.status == "error" {
        let err_type = if stop_reason == StopReason::ConfigError {
            "config error"
        } else {
            "runtime error"
        };
        errors += 1;
        testcases.push_str(&format!(
            "    <error message=\"{}\">{}</error>\n",
            xml_escape(err_type),
            xml_escape(&details)
        ));
    } else if result.status == "fail" && !any_assertion_failed {
        failures += 1;
        testcases.push_str(&format!(
            "    <failure message=\"{}\">{}</failure>\n",
            xml_escape("stop condition requires expected_stop_reason assertion"),
            xml_escape(&details)
        ));
    }
    testcases.push_str("  </testcase>\n");

    for (idx, a) in result.assertions.iter().enumerate() {
        tests += 1;
        let name = format!(
            "assertion {}: {}",
            idx + 1,
            assertion_short_name(&a.assertion)
        );
        testcases.push_str(&format!(
            "  <testcase classname=\"chiselv\" name=\"{}\" time=\"0.000000\">\n",
            xml_escape(&name)
        ));
        if !a.passed {
            failures += 1;
            testcases.push_str(&format!(
                "    <failure message=\"assertion failed\">{}</failure>\n",
                xml_escape(&format!("{}\n\n{}", name, details))
            ));
        }
        testcases.push_str("  </testcase>\n");
    }

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="chiselv" tests="{}" failures="{}" errors="{}" time="{:.6}">"#,
        tests, failures, errors, time_secs
    ));
    xml.push('\n');
    xml.push_str("  <properties>\n");
    xml.push_str(&format!(
        "    <property name=\"stop_reason\" value=\"{}\"/>\n",
        xml_escape(&format!("{:?}", stop_reason))
    ));
    xml.push_str(&format!(
        "    <property name=\"board_hash\" value=\"{}\"/>\n",
        xml_escape(&result.board_hash)
    ));
    xml.push_str("  </properties>\n");
    xml.push_str(&testcases);
    xml.push_str("</testsuite>\n");

    std::fs::write(path, xml)
}

fn assertion_short_name(assertion: &TestAssertion) -> String {
    const MAX_LEN: usize = 120;
    let s = match assertion {
        TestAssertion::UartContains(a) => format!("uart_contains: {}", a.uart_contains),
        TestAssertion::ExpectedStopReason(a) => {
            format!("expected_stop_reason: {:?}", a.expected_stop_reason)
        }
        TestAssertion::GpioLevel(a) => format!(
            "gpio_level: pin {} {}",
            a.gpio_level.pin,
            if a.gpio_level.high { "high" } else { "low" }
        ),
        TestAssertion::RegisterValue(a) => format!(
            "register_value: {:#010x} == {:#x}",
            a.register_value.address, a.register_value.expected_value
        ),
    };

    if s.len() <= MAX_LEN {
        return s;
    }

    let mut truncated = s.chars().take(MAX_LEN - 1).collect::<String>();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chiselv_config::{StopReasonAssertion, UartContainsAssertion};

    fn outcome(stop_reason: StopReason) -> RunOutcome {
        RunOutcome {
            stop_reason,
            cycles: 100,
            exit_code: None,
            fault: None,
        }
    }

    fn expect_stop(reason: StopReason, passed: bool) -> AssertionResult {
        AssertionResult {
            assertion: TestAssertion::ExpectedStopReason(StopReasonAssertion {
                expected_stop_reason: reason,
            }),
            passed,
        }
    }

    #[test]
    fn test_unescape_input() {
        assert_eq!(unescape_input(r"hi\r"), b"hi\r");
        assert_eq!(unescape_input(r"a\\b\n"), b"a\\b\n");
        assert_eq!(unescape_input(r"\q"), b"\\q");
        assert_eq!(unescape_input("trailing\\"), b"trailing\\");
    }

    #[test]
    fn test_status_rules() {
        assert_eq!(run_status(&outcome(StopReason::Exit), &[]), "pass");
        assert_eq!(run_status(&outcome(StopReason::MaxCycles), &[]), "pass");
        assert_eq!(run_status(&outcome(StopReason::MaxUartBytes), &[]), "fail");
        assert_eq!(
            run_status(
                &outcome(StopReason::MaxUartBytes),
                &[expect_stop(StopReason::MaxUartBytes, true)]
            ),
            "pass"
        );
        assert_eq!(
            run_status(&outcome(StopReason::MemoryViolation), &[]),
            "error"
        );
        let failed = AssertionResult {
            assertion: TestAssertion::UartContains(UartContainsAssertion {
                uart_contains: "nope".to_string(),
            }),
            passed: false,
        };
        assert_eq!(run_status(&outcome(StopReason::Exit), &[failed]), "fail");
    }

    #[test]
    fn test_resolve_script_path() {
        let script = Path::new("configs/scenarios/echo.yaml");
        assert_eq!(
            resolve_script_path(script, "../boards/chiselv.yaml"),
            PathBuf::from("configs/scenarios/../boards/chiselv.yaml")
        );
        assert_eq!(
            resolve_script_path(script, "/abs/board.yaml"),
            PathBuf::from("/abs/board.yaml")
        );
    }

    #[test]
    fn test_input_delay_defaults() {
        assert_eq!(input_delay(Program::Echo, None), ECHO_INPUT_DELAY_CYCLES);
        assert_eq!(input_delay(Program::Blink, None), DEFAULT_INPUT_DELAY_CYCLES);
        assert_eq!(input_delay(Program::Echo, Some(5)), 5);
    }

    #[test]
    fn test_exit_details_report_code() {
        let mut o = outcome(StopReason::Exit);
        o.exit_code = Some(0);
        let limits = TestLimits {
            max_cycles: 10,
            max_uart_bytes: None,
        };
        let details = build_stop_reason_details(&o, &limits, 0);
        assert!(details.triggered_limit.is_none());
        assert_eq!(details.observed.unwrap().name, "exit_code");
    }
}
