//! Config load/save error messages and on-disk layout.

use assert_fs::prelude::*;
use devreg_core::{config, ConfigError, EngineConfig, Registry};
use predicates::prelude::predicate;
use std::fs;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_from_missing_file_returns_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("devreg.yaml");
    let err = config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config not found"));
    assert!(err.to_string().contains("devreg.yaml"));
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".devreg");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("config.yaml"), "must contain file path, got: {msg}");
}

#[test]
fn wrong_field_type_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".devreg/config.yaml")
        .write_str("retry:\n  max_retries: many\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Save layout
// ---------------------------------------------------------------------------

#[test]
fn save_writes_yaml_under_dot_devreg() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut cfg = EngineConfig::default();
    cfg.endpoints.identity_server_address = "eu1.cloud.thethings.network:8884".to_string();
    cfg.delete_source_device = true;
    config::save_at(home.path(), &cfg).expect("save");

    let file = home.child(".devreg/config.yaml");
    file.assert(predicate::path::exists());
    file.assert(predicate::str::contains("identity_server_address: eu1.cloud.thethings.network:8884"));
    file.assert(predicate::str::contains("delete_source_device: true"));
    assert!(!home.child(".devreg/config.yaml.tmp").path().exists());
}

#[cfg(unix)]
#[test]
fn saved_config_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &EngineConfig::default()).expect("save");
    let mode = fs::metadata(config::config_path_at(home.path()))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn explicit_file_overrides_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("source.yaml");
    file.write_str(
        "endpoints:\n  default_address: localhost:1885\n  join_server_address: ''\n\
         export_claim_authentication_code: false\nretry:\n  cooldown_ms: 50\n",
    )
    .expect("write");

    let cfg = config::load_from(file.path()).expect("load");
    assert!(!cfg.export_claim_authentication_code);
    assert_eq!(cfg.endpoints.address(Registry::Join), "localhost:1885");
    assert_eq!(cfg.retry.cooldown_ms, 50);
    assert_eq!(cfg.retry.max_retries, 10);
}
