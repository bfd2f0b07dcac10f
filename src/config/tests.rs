use std::fs;

use tempfile::tempdir;

use super::{load_config, ConfigError, RelayConfig, StoreConfig};
use crate::memory::StoreKind;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().expect("tempdir");
    let loaded = load_config(Some(dir.path().join("absent.toml"))).expect("load");

    assert!(!loaded.config_exists);
    assert_eq!(loaded.config, RelayConfig::default());
    assert_eq!(loaded.config.server.addr(), "127.0.0.1:8090");
    assert_eq!(loaded.config.emitter.flush_interval_ms, 100);
    assert_eq!(loaded.config.emitter.max_buffer_chars, 200);
    assert_eq!(loaded.config.logging.level, "info");
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[server]
port = 9000

[emitter]
terminators = [".", ";"]

[store]
kind = "jsonl"
dir = "/var/lib/relay"
"#,
    )
    .expect("write");

    let loaded = load_config(Some(path)).expect("load");
    let config = loaded.config;
    assert!(loaded.config_exists);
    assert_eq!(config.server.addr(), "127.0.0.1:9000");
    assert_eq!(config.emitter.terminators, vec!['.', ';']);
    assert_eq!(config.emitter.flush_interval_ms, 100);
    assert_eq!(config.store.kind, StoreKind::Jsonl);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server\nport = ").expect("write");

    assert!(matches!(load_config(Some(path)), Err(ConfigError::Toml(_))));
}

#[test]
fn store_section_builds_matching_store() {
    let dir = tempdir().expect("tempdir");
    let memory = StoreConfig::default().build().expect("memory store");
    assert_eq!(memory.kind(), StoreKind::Memory);

    let jsonl = StoreConfig {
        kind: StoreKind::Jsonl,
        dir: Some(dir.path().to_path_buf()),
    }
    .build()
    .expect("jsonl store");
    assert_eq!(jsonl.kind(), StoreKind::Jsonl);
}
