use std::process::Command;

use crate::common::worker_binary;

#[test]
fn test_mine_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_procfarm"))
        .arg("--workers")
        .arg("2")
        .arg("--worker-bin")
        .arg(worker_binary())
        .arg("mine")
        .arg("--rounds")
        .arg("2")
        .arg("--difficulty")
        .arg("8")
        .arg("--window")
        .arg("65536")
        .arg("--seed")
        .arg("11")
        .output()
        .expect("Failed to execute procfarm");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "Command failed with status: {:?}\nstderr: {}\nstdout: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr),
        stdout
    );

    assert!(stdout.contains("Mining 2 block(s) at difficulty 8 with 2 worker(s)"));
    assert!(stdout.contains("Accepted: 2"));
    assert!(stdout.contains("Mined blocks:"));
    assert!(stdout.contains("All 2 worker(s) exited cleanly"));
}

#[test]
fn test_worker_bin_from_env() {
    let output = Command::new(env!("CARGO_BIN_EXE_procfarm"))
        .env("PROCFARM_WORKER", worker_binary())
        .args(["-j", "1", "mine", "--rounds", "1", "--difficulty", "4", "--seed", "3"])
        .output()
        .expect("Failed to execute procfarm");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Accepted: 1"));
}

#[test]
fn test_bad_worker_bin_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_procfarm"))
        .args(["--worker-bin", "/nonexistent/worker", "mine", "--rounds", "1"])
        .output()
        .expect("Failed to execute procfarm");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to spawn worker 0"));
}
