//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use cortex_infra::config;
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> (NamedTempFile, std::path::PathBuf) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    (temp_file, path)
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "database": {
            "path": "/tmp/integration_test.db",
            "pool_size": 10,
            "encryption_key": "test-encryption-key-123"
        },
        "flags": {
            "ttl_seconds": 30,
            "refresh_timeout_ms": 500
        },
        "logging": {
            "level": "debug",
            "json": true
        }
    }"#;
    let (_temp, path) = write_config(json_content, "json");

    let config = config::load_from_file(Some(path.clone())).expect("config loads");

    assert_eq!(config.database.path, "/tmp/integration_test.db");
    assert_eq!(config.database.pool_size, 10);
    assert_eq!(config.database.encryption_key, Some("test-encryption-key-123".to_string()));
    assert_eq!(config.flags.ttl().as_secs(), 30);
    assert_eq!(config.flags.refresh_timeout().as_millis(), 500);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file_uses_defaults() {
    let toml_content = r#"
[database]
path = "/tmp/integration_test.db"
"#;
    let (_temp, path) = write_config(toml_content, "toml");

    let config = config::load_from_file(Some(path.clone())).expect("config loads");

    assert_eq!(config.database.path, "/tmp/integration_test.db");
    assert_eq!(config.database.encryption_key, None);
    assert_eq!(config.flags.ttl_seconds, 300);
    assert_eq!(config.flags.refresh_timeout_ms, 2_000);
    assert!(!config.logging.json);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_with_invalid_json() {
    let (_temp, path) = write_config(r#"{ "database": { "pool_size": "many" } }"#, "json");

    let result = config::load_from_file(Some(path.clone()));
    assert!(result.is_err(), "Should fail with invalid JSON");

    std::fs::remove_file(path).ok();
}
