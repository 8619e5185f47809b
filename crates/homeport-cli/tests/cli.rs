//! Integration tests for CLI argument handling and error exit codes
//!
//! None of these reach Docker: each run fails before the orchestrator starts.

use std::path::Path;
use std::process::Command;

/// Helper to run the homeport binary
fn homeport(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_homeport"))
        .args(args)
        .env_remove("HOMEPORT_PASSWORD")
        .env_remove("HOMEPORT_USERNAME")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute homeport")
}

fn write_settings(dir: &Path, body: &str) -> String {
    let path = dir.join("config.yaml");
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_help_lists_commands() {
    let output = homeport(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("install"));
    assert!(stdout.contains("uninstall"));
}

#[test]
fn test_install_help_lists_flags() {
    let output = homeport(&["install", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--no-browser"));
    assert!(stdout.contains("--chart-version"));
    assert!(stdout.contains("HOMEPORT_PASSWORD"));
}

#[test]
fn test_install_requires_password() {
    let output = homeport(&["install", "--no-browser"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--password"));
}

#[test]
fn test_missing_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");

    let output = homeport(&["--config", missing.to_str().unwrap(), "uninstall"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error"));
}

#[test]
fn test_unknown_provider() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_settings(
        dir.path(),
        &format!("kubeconfig: {}\n", dir.path().join("kc").display()),
    );

    let output = homeport(&["--config", &config, "--provider", "minikube", "uninstall"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("minikube"));
}

#[test]
fn test_invalid_settings() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_settings(dir.path(), "clusterName: \"\"\n");

    let output = homeport(&["--config", &config, "uninstall"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_port_zero_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_settings(
        dir.path(),
        &format!("kubeconfig: {}\n", dir.path().join("kc").display()),
    );

    let output = homeport(&[
        "--config", &config, "install", "--password", "s3cret", "--port", "0",
    ]);
    assert_eq!(output.status.code(), Some(64));
}
