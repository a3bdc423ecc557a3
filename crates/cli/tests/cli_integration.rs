// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::Command;

fn fast_board() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/boards/chiselv-fast.yaml")
}

#[test]
fn test_info_json_reports_reference_board() {
    let output = Command::new(env!("CARGO_BIN_EXE_chiselv"))
        .args(["info", "--json"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["clock_hz"], 25_000_000);
    assert_eq!(info["gpio_count"], 8);
    assert_eq!(info["has_pwm0"], false);
    assert_eq!(info["uart0_divisor"], 12);
}

#[test]
fn test_info_text_prints_header() {
    let output = Command::new(env!("CARGO_BIN_EXE_chiselv"))
        .args(["info"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("clock: 25MHz"));
    assert!(stdout.contains("uart0 divisor: 12"));
}

#[test]
fn test_run_echo_with_input() {
    let output = Command::new(env!("CARGO_BIN_EXE_chiselv"))
        .args([
            "run",
            "--program",
            "echo",
            "--board",
            fast_board().to_str().unwrap(),
            "--input",
            r"ok\r",
            "--json",
        ])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("You typed: ok"));
    assert!(stdout.contains("\"stop_reason\": \"exit\""));
}

#[test]
fn test_run_writes_vcd_and_snapshot() {
    let mut dir = std::env::temp_dir();
    dir.push(format!("chiselv-tests-run-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let vcd = dir.join("blink.vcd");
    let snapshot = dir.join("snapshot.json");

    let output = Command::new(env!("CARGO_BIN_EXE_chiselv"))
        .args([
            "run",
            "--program",
            "blink",
            "--board",
            fast_board().to_str().unwrap(),
            "--vcd",
            vcd.to_str().unwrap(),
            "--snapshot",
            snapshot.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let waves = std::fs::read_to_string(&vcd).unwrap();
    assert!(waves.contains("$var wire 8"));
    assert!(waves.contains("pads"));

    let state: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(state["exit_code"], 0);
    assert!(state["bus"]["peripherals"]["gpio0"].is_object());
}

#[test]
fn test_unknown_program_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_chiselv"))
        .args(["run", "--program", "doom"])
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());
}
