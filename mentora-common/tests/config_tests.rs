//! Tests for configuration resolution and graceful degradation
//!
//! Missing TOML files must not abort startup; services fall back to
//! compiled defaults.

use mentora_common::config::{config_file_path, default_data_dir, ensure_dir_exists, load_toml};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SampleConfig {
    name: String,
    port: Option<u16>,
}

#[test]
fn test_config_file_path_under_mentora_dir() {
    let path = config_file_path("relay");
    let path_str = path.to_string_lossy();

    assert!(path_str.contains("mentora"));
    assert!(path_str.ends_with("relay.toml"));
}

#[test]
fn test_default_data_dir_not_empty() {
    let dir = default_data_dir();
    assert!(!dir.as_os_str().is_empty());
    assert!(dir.to_string_lossy().contains("mentora"));
}

#[test]
fn test_load_toml_missing_file_returns_none() {
    let result: Option<SampleConfig> =
        load_toml(Path::new("/nonexistent/mentora/test.toml")).unwrap();

    assert!(result.is_none());
}

#[test]
fn test_load_toml_parses_valid_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("sample.toml");
    std::fs::write(&path, "name = \"relay\"\nport = 5810\n").unwrap();

    let parsed: SampleConfig = load_toml(&path).unwrap().expect("config should parse");

    assert_eq!(parsed.name, "relay");
    assert_eq!(parsed.port, Some(5810));
}

#[test]
fn test_load_toml_invalid_file_is_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "name = [unclosed\n").unwrap();

    let result: mentora_common::Result<Option<SampleConfig>> = load_toml(&path);

    assert!(result.is_err());
}

#[test]
fn test_ensure_dir_exists_creates_nested_dirs() {
    let temp_dir = tempfile::tempdir().unwrap();
    let nested = temp_dir.path().join("a").join("b").join("c");

    ensure_dir_exists(&nested).unwrap();

    assert!(nested.is_dir());

    // Second call on an existing directory is a no-op
    ensure_dir_exists(&nested).unwrap();
}
