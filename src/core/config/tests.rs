use super::data::{Config, DEFAULT_GREETING};
use super::io::{config_path_in, ConfigError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert_eq!(config.chat_url(), "http://127.0.0.1:8787/api/chat");
    assert!(config.stream_enabled());
    assert_eq!(config.greeting(), Some(DEFAULT_GREETING));
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = config_path_in(&temp_dir.path().join("nested"));

    let mut config = Config::default();
    config
        .set_value("base-url", "https://chat.example.com/")
        .expect("set base-url");
    config.set_value("stream", "off").expect("set stream");
    config
        .set_value("connect-timeout", "5")
        .expect("set connect-timeout");
    config.save_to_path(&config_path).expect("save config");

    let loaded = Config::load_from_path(&config_path).expect("load config");
    assert_eq!(loaded, config);
    assert_eq!(loaded.chat_url(), "https://chat.example.com/api/chat");
    assert!(!loaded.stream_enabled());
    assert_eq!(loaded.connect_timeout(), Some(Duration::from_secs(5)));

    let mut loaded = loaded;
    loaded.unset_value("stream").expect("unset stream");
    loaded.save_to_path(&config_path).expect("save config");
    let reloaded = Config::load_from_path(&config_path).expect("reload config");
    assert!(reloaded.stream_enabled());
}

#[test]
fn invalid_toml_reports_parse_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "base_url = [").expect("write config");

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse config at "));
}

#[test]
fn empty_greeting_disables_it() {
    let mut config = Config::default();
    config.set_value("greeting", "").expect("set greeting");
    assert_eq!(config.greeting(), None);
}

#[test]
fn unknown_keys_and_bad_values_are_rejected() {
    let mut config = Config::default();
    let err = config.set_value("theme", "dark").expect_err("unknown key");
    assert!(err.starts_with("Unknown config key: theme"));
    assert!(config.set_value("stream", "maybe").is_err());
    assert!(config.set_value("connect-timeout", "soon").is_err());
    assert!(config.unset_value("model").is_err());
}

#[test]
fn describe_lists_effective_values() {
    let mut config = Config::default();
    config.set_value("endpoint", "/v2/chat").expect("set endpoint");
    let text = config.describe();
    assert!(text.contains("  endpoint: /v2/chat\n"));
    assert!(text.contains("  stream: on\n"));
    assert!(text.contains("  system-prompt: (unset)\n"));
    assert!(text.contains("  connect-timeout: (unset)\n"));
}
