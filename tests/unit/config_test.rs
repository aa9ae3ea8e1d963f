//! Unit tests for configuration loading

use std::fs;

use ktrace::capture::ProxyConfig;
use ktrace::Config;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn full_config_file_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[storage]
directory = "/srv/logs"

[capture]
shell = "/bin/zsh"
idle_gap_ms = 10
max_chunk_bytes = 4096

[analysis]
regex = true
top_n = 3

[logging]
level = "debug"
file = "/tmp/ktrace-test.log"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.storage_directory().to_str(), Some("/srv/logs"));
    assert_eq!(config.resolve_shell(None), "/bin/zsh");
    assert!(config.analysis.regex);
    assert_eq!(config.analysis.top_n, 3);
    assert_eq!(config.log_file().unwrap().to_str(), Some("/tmp/ktrace-test.log"));

    let proxy = ProxyConfig::from(&config.capture);
    assert_eq!(proxy.coalesce.idle_gap, Duration::from_millis(10));
    assert_eq!(proxy.coalesce.max_chunk_bytes, 4096);
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[capture\nidle_gap_ms = ").unwrap();
    let err = Config::load_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn zero_chunk_size_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[capture]\nmax_chunk_bytes = 0\n").unwrap();
    assert!(Config::load_from(&path).is_err());
}
