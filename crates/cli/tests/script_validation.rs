// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn fast_board() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/boards/chiselv-fast.yaml")
}

fn write_temp_file(prefix: &str, contents: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("chiselv-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = dir.join(format!("{}-{}.yaml", prefix, nonce));
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

fn run_test(script: &PathBuf, output_dir: &PathBuf) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chiselv"))
        .args([
            "test",
            "--script",
            script.to_str().unwrap(),
            "--no-uart-stdout",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command")
}

fn read_result(output_dir: &PathBuf) -> serde_json::Value {
    let text = std::fs::read_to_string(output_dir.join("result.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_unknown_schema_version_is_config_error() {
    let script = write_temp_file(
        "bad-schema",
        r#"
schema_version: "2.0"
inputs:
  program: blink
limits:
  max_cycles: 1000
"#,
    );
    let output_dir = script.with_extension("out");
    let output = run_test(&script, &output_dir);

    assert_eq!(output.status.code(), Some(2));
    let result = read_result(&output_dir);
    assert_eq!(result["status"], "error");
    assert_eq!(result["stop_reason"], "config_error");
    assert!(result["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported schema_version"));
}

#[test]
fn test_unknown_program_is_config_error() {
    let script = write_temp_file(
        "bad-program",
        r#"
schema_version: "1.0"
inputs:
  program: doom
limits:
  max_cycles: 1000
"#,
    );
    let output_dir = script.with_extension("out");
    let output = run_test(&script, &output_dir);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_board_is_config_error() {
    let script = write_temp_file(
        "missing-board",
        r#"
schema_version: "1.0"
inputs:
  program: blink
  board: "does-not-exist.yaml"
limits:
  max_cycles: 1000
"#,
    );
    let output_dir = script.with_extension("out");
    let output = run_test(&script, &output_dir);

    assert_eq!(output.status.code(), Some(2));
    let result = read_result(&output_dir);
    assert!(result["config"]["board"]
        .as_str()
        .unwrap()
        .ends_with("does-not-exist.yaml"));
}

#[test]
fn test_failed_assertion_exits_1() {
    let script = write_temp_file(
        "blink-wrong-level",
        &format!(
            r#"
schema_version: "1.0"
inputs:
  program: blink
  board: "{}"
  rounds: 1
limits:
  max_cycles: 50000000
assertions:
  - expected_stop_reason: exit
  - gpio_level:
      pin: 1
      high: true
"#,
            fast_board().display()
        ),
    );
    let output_dir = script.with_extension("out");
    let output = run_test(&script, &output_dir);

    assert_eq!(output.status.code(), Some(1));
    let result = read_result(&output_dir);
    assert_eq!(result["status"], "fail");
    assert_eq!(result["assertions"][0]["passed"], true);
    assert_eq!(result["assertions"][1]["passed"], false);

    let junit = std::fs::read_to_string(output_dir.join("junit.xml")).unwrap();
    assert!(junit.contains("failures=\"1\""));
}

#[test]
fn test_cycle_limit_passes_unless_asserted_otherwise() {
    let script = write_temp_file(
        "blink-forever",
        &format!(
            r#"
schema_version: "1.0"
inputs:
  program: blink
  board: "{}"
  rounds: 0
limits:
  max_cycles: 100000
"#,
            fast_board().display()
        ),
    );
    let output_dir = script.with_extension("out");
    let output = run_test(&script, &output_dir);

    assert!(output.status.success());
    let result = read_result(&output_dir);
    assert_eq!(result["stop_reason"], "max_cycles");
    assert_eq!(
        result["stop_reason_details"]["triggered_limit"]["name"],
        "max_cycles"
    );
}

#[test]
fn test_uart_byte_limit_needs_expected_stop_reason() {
    let body = |assertions: &str| {
        format!(
            r#"
schema_version: "1.0"
inputs:
  program: echo
  board: "{}"
  hangup: false
limits:
  max_cycles: 5000000
  max_uart_bytes: 10
assertions:
{}
"#,
            fast_board().display(),
            assertions
        )
    };

    let script = write_temp_file("uart-limit", &body("  - uart_contains: \"Chisel\""));
    let output_dir = script.with_extension("out");
    let output = run_test(&script, &output_dir);
    assert_eq!(output.status.code(), Some(1));

    let script = write_temp_file(
        "uart-limit-expected",
        &body("  - expected_stop_reason: max_uart_bytes"),
    );
    let output_dir = script.with_extension("out");
    let output = run_test(&script, &output_dir);
    assert!(output.status.success());
    assert_eq!(read_result(&output_dir)["uart_bytes"], 10);
}
