//! Fast CLI tests using assert_cmd.
//! These test the binary directly without needing a container engine.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// dkr isolated from the user's config and environment
fn dkr(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dkr").unwrap();
    cmd.env("DKR_CONFIG", home.path().join("config.toml"))
        .env_remove("DOCKER_PASSTHROUGH")
        .env_remove("DKR_LOG")
        .env("DOCKER_HOST", "unix:///nonexistent/dkr-test.sock");
    cmd
}

#[test]
fn test_unknown_command_exits_2() {
    let home = TempDir::new().unwrap();
    dkr(&home)
        .args(["frobnicate", "thing"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown docker command: frobnicate"));
}

#[test]
fn test_missing_command_exits_2() {
    let home = TempDir::new().unwrap();
    dkr(&home).assert().code(2).stderr(predicate::str::is_empty().not());
}

#[test]
fn test_missing_target_fails() {
    let home = TempDir::new().unwrap();
    dkr(&home)
        .arg("pull")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("requires at least 1 argument"));
}

#[test]
fn test_unreachable_engine_fails_with_1() {
    let home = TempDir::new().unwrap();
    dkr(&home)
        .args(["ps", "-a"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot connect to the Docker daemon"));
}

#[test]
fn test_broken_config_falls_back_to_defaults() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("config.toml"), "[engine\n").unwrap();

    dkr(&home)
        .args(["frobnicate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown docker command"));
}

#[cfg(unix)]
#[test]
fn test_passthrough_runs_local_binary() {
    use std::os::unix::fs::PermissionsExt;

    let home = TempDir::new().unwrap();
    let bin = home.path().join("bin");
    std::fs::create_dir(&bin).unwrap();
    let fake = bin.join("docker");
    std::fs::write(&fake, "#!/bin/sh\necho \"delegated $@\"\nexit 7\n").unwrap();
    std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

    dkr(&home)
        .env("DOCKER_PASSTHROUGH", "1")
        .env("PATH", &bin)
        .args(["ps", "-a"])
        .assert()
        .code(7)
        .stdout(predicate::str::contains("delegated ps -a"));
}
