//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::panic)]

use remote_marshal::config::{LoggingConfig, MarshalConfig, DEFAULT_CODEC, MAX_PAYLOAD_SIZE};
use remote_marshal::error::MarshalError;
use remote_marshal::{CompressionKind, MarshalRegistry, Marshaller};
use std::sync::Arc;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = MarshalConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.marshal.default_codec, DEFAULT_CODEC);
}

#[test]
fn test_unknown_default_codec() {
    let mut config = MarshalConfig::default();
    config.marshal.default_codec = "pickle".to_string();

    let errors = config.validate();
    assert!(!errors.is_empty(), "Should have validation errors");
    assert!(errors.iter().any(|e| e.contains("Unknown default codec")));
}

#[test]
fn test_empty_default_codec() {
    let mut config = MarshalConfig::default();
    config.marshal.default_codec = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_invalid_zstd_level() {
    let mut config = MarshalConfig::default();
    config.compression.level = 40;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Invalid compression level")));
}

#[test]
fn test_level_ignored_for_lz4() {
    let mut config = MarshalConfig::default();
    config.compression.kind = CompressionKind::Lz4;
    config.compression.level = 0;

    assert!(config.validate().is_empty());
}

#[test]
fn test_threshold_above_payload_cap() {
    let mut config = MarshalConfig::default();
    config.compression.min_size = MAX_PAYLOAD_SIZE + 1;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("larger than max payload size")));
}

#[test]
fn test_app_name_too_long() {
    let config = MarshalConfig {
        logging: LoggingConfig {
            app_name: "x".repeat(65),
            ..LoggingConfig::default()
        },
        ..MarshalConfig::default()
    };

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("too long")));
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = MarshalConfig::default();
    config.marshal.default_codec = "yaml".to_string();
    config.compression.level = -5;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(
        errors.len() >= 3,
        "Should have at least 3 errors, got: {:?}",
        errors
    );
}

#[test]
fn test_validate_strict_returns_config_error() {
    let mut config = MarshalConfig::default();
    config.marshal.default_codec = "yaml".to_string();

    match config.validate_strict() {
        Err(MarshalError::Config(msg)) => {
            assert!(msg.contains("Configuration validation failed"));
            assert!(msg.contains("yaml"));
        }
        other => panic!("expected a config error, got {other:?}"),
    }
    assert!(MarshalConfig::default().validate_strict().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = MarshalConfig::from_toml(
        r#"
        [marshal]
        default_codec = "json"

        [compression]
        kind = "lz4"
        "#,
    )
    .expect("partial config parses");

    assert_eq!(config.marshal.default_codec, "json");
    assert_eq!(config.compression.kind, CompressionKind::Lz4);
    assert_eq!(config.compression.min_size, 200);
    assert!(!config.compression.enabled);
    assert_eq!(config.logging.log_level, Level::INFO);
}

#[test]
fn test_invalid_toml_is_config_error() {
    assert!(matches!(
        MarshalConfig::from_toml("[marshal\ndefault_codec = 1"),
        Err(MarshalError::Config(_))
    ));
    assert!(matches!(
        MarshalConfig::from_toml("[logging]\nlog_level = \"loud\""),
        Err(MarshalError::Config(_))
    ));
}

#[test]
fn test_example_config_parses_back() {
    let text = MarshalConfig::example_config();
    let config = MarshalConfig::from_toml(&text).expect("example config parses");
    assert!(config.validate().is_empty());
    assert_eq!(config.compression.level, 3);
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!(
        "remote-marshal-config-{}.toml",
        std::process::id()
    ));
    let config = MarshalConfig::default_with_overrides(|c| {
        c.marshal.default_codec = "compact".to_string();
        c.compression.enabled = true;
        c.traceback.detailed = true;
        c.logging.log_level = Level::DEBUG;
    });

    config.save_to_file(&path).expect("save config");
    let loaded = MarshalConfig::from_file(&path).expect("load config");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.marshal.default_codec, "compact");
    assert!(loaded.compression.enabled);
    assert!(loaded.traceback.detailed);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
}

#[test]
fn test_missing_file_is_config_error() {
    let result = MarshalConfig::from_file("/nonexistent/remote-marshal.toml");
    assert!(matches!(result, Err(MarshalError::Config(_))));
}

#[test]
fn test_env_overrides() {
    std::env::set_var("REMOTE_MARSHAL_CODEC", "json");
    std::env::set_var("REMOTE_MARSHAL_COMPRESSION", "on");
    std::env::set_var("REMOTE_MARSHAL_COMPRESSION_MIN_SIZE", "not-a-number");
    std::env::set_var("REMOTE_MARSHAL_LOG_LEVEL", "warn");

    let config = MarshalConfig::from_env().expect("env config");

    std::env::remove_var("REMOTE_MARSHAL_CODEC");
    std::env::remove_var("REMOTE_MARSHAL_COMPRESSION");
    std::env::remove_var("REMOTE_MARSHAL_COMPRESSION_MIN_SIZE");
    std::env::remove_var("REMOTE_MARSHAL_LOG_LEVEL");

    assert_eq!(config.marshal.default_codec, "json");
    assert!(config.compression.enabled);
    assert_eq!(config.compression.min_size, 200);
    assert_eq!(config.logging.log_level, Level::WARN);
}

#[test]
fn test_marshaller_from_config() {
    let registry = Arc::new(MarshalRegistry::with_available_codecs());
    let config = MarshalConfig::default_with_overrides(|c| {
        c.compression.enabled = true;
        c.compression.min_size = 16;
    });

    let marshaller = Marshaller::from_config(&config, registry.clone()).expect("marshaller");
    assert_eq!(marshaller.codec().name(), "literal");
    assert!(marshaller.compress_by_default());
    assert_eq!(marshaller.policy().min_size, 16);

    let bad = MarshalConfig::default_with_overrides(|c| c.marshal.default_codec = "yaml".into());
    assert!(matches!(
        Marshaller::from_config(&bad, registry),
        Err(MarshalError::UnknownCodec(_))
    ));
}
