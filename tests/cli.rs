//! Binary behaviour: argument handling, configuration errors and exit codes

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

/// Run the binary from an empty directory with no NETMON_* variables set
fn netmon(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("netmon").unwrap();
    cmd.current_dir(dir.path()).env("NO_COLOR", "1");
    for (key, _) in std::env::vars() {
        if key.starts_with("NETMON_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

/// A loopback port with nothing listening on it
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    netmon(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("speed"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    netmon(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_serve_without_speed_servers_exits_before_starting() {
    let dir = TempDir::new().unwrap();
    netmon(&dir)
        .arg("serve")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("NETMON_SPEED_SERVER_IDS"));
}

#[test]
fn test_invalid_env_value_is_config_error() {
    let dir = TempDir::new().unwrap();
    netmon(&dir)
        .env("NETMON_PING_COUNT", "lots")
        .args(["ping", "--servers", "1.1.1.1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("NETMON_PING_COUNT"));
}

#[test]
fn test_invalid_env_file_value_is_config_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "NETMON_HTTP_PORT=not-a-port\n").unwrap();
    netmon(&dir)
        .args(["serve", "--speed-servers", "5188"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("NETMON_HTTP_PORT"));
}

#[test]
fn test_conflicting_color_flags() {
    let dir = TempDir::new().unwrap();
    netmon(&dir)
        .args(["--color", "--no-color", "ping"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--color"));
}

#[test]
fn test_speed_without_servers_is_rejected() {
    let dir = TempDir::new().unwrap();
    netmon(&dir)
        .arg("speed")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--servers"));
}

#[test]
fn test_unreachable_server_is_network_error() {
    let dir = TempDir::new().unwrap();
    let url = format!("http://127.0.0.1:{}", closed_port());
    netmon(&dir)
        .args(["ping", "--servers", "1.1.1.1", "--url", &url, "--timeout", "5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NETWORK"));
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    let dir = TempDir::new().unwrap();
    netmon(&dir).assert().failure();
}
