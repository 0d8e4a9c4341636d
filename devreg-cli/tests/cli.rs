use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn devreg_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("devreg"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "warn");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
    let path = dir.path().join("devreg.yaml");
    std::fs::write(&path, yaml).expect("write config");
    path
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().expect("home");
    devreg_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("export"))
        .stdout(contains("clear-session"))
        .stdout(contains("delete"))
        .stdout(contains("--dry-run"));
}

#[test]
fn missing_config_file_is_reported() {
    let home = TempDir::new().expect("home");
    let missing = home.path().join("nope.yaml");
    devreg_cmd(home.path())
        .arg("--config")
        .arg(&missing)
        .args(["delete", "app1", "d1"])
        .assert()
        .failure()
        .stderr(contains("config not found"));
}

#[test]
fn delete_without_identity_address_fails() {
    let home = TempDir::new().expect("home");
    let config = write_config(&home, "insecure: true\n");
    devreg_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["delete", "app1", "d1"])
        .assert()
        .failure()
        .stderr(contains("failed to delete app1/d1"))
        .stderr(contains("identity registry"));
}

#[test]
fn export_reports_failed_devices() {
    let home = TempDir::new().expect("home");
    devreg_cmd(home.path())
        .args(["export", "app1", "d1", "d2", "--fields", "name,mac_settings"])
        .assert()
        .failure()
        .stdout(predicates::str::is_empty())
        .stderr(contains("app1/d1: identity registry"))
        .stderr(contains("2 of 2 devices failed to export"));
}

#[test]
fn export_requires_a_device() {
    let home = TempDir::new().expect("home");
    devreg_cmd(home.path())
        .args(["export", "app1"])
        .assert()
        .failure();
}

#[test]
fn custom_ca_bundle_is_rejected() {
    let home = TempDir::new().expect("home");
    let config = write_config(
        &home,
        "endpoints:\n  default_address: localhost:1885\nca_file: /etc/ssl/private-ca.pem\n",
    );
    devreg_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["clear-session", "app1", "d1"])
        .assert()
        .failure()
        .stderr(contains("ca_file"));
}

#[test]
fn dry_run_delete_touches_no_registry() {
    let home = TempDir::new().expect("home");
    // Nothing listens here; a real call would fail.
    let config = write_config(&home, "endpoints:\n  default_address: 127.0.0.1:9\ninsecure: true\n");
    devreg_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["--dry-run", "delete", "app1", "d1"])
        .assert()
        .success()
        .stderr(contains("[dry-run]"))
        .stderr(contains("deleted app1/d1 from application, network, join, identity"));
}

#[test]
fn dry_run_clear_session_from_home_config() {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".devreg");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(
        dir.join("config.yaml"),
        "endpoints:\n  default_address: 127.0.0.1:9\ndry_run: true\n",
    )
    .expect("write config");

    devreg_cmd(home.path())
        .args(["clear-session", "app1", "d1"])
        .assert()
        .success()
        .stderr(contains("[dry-run]"))
        .stderr(contains("cleared session of app1/d1"));
}
