//! # Configuration Management
//!
//! Centralized configuration for the marshalling layer.
//!
//! Covers the default codec, the compression policy, traceback formatting
//! and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - The default codec is `literal`, whose parser accepts literal data forms
//!   only
//! - Every decoder caps nesting depth at 256
//! - Decompression output is capped at `MAX_PAYLOAD_SIZE`

use crate::core::serialization::SerializationFormat;
use crate::error::{MarshalError, Result};
use crate::utils::compression::{CompressionKind, CompressionPolicy, DEFAULT_ZSTD_LEVEL};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Max allowed payload size (e.g. 16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Payloads shorter than this are never compressed
pub const DEFAULT_COMPRESSION_MIN_SIZE: usize = 200;

/// Codec used when nothing else is configured
pub const DEFAULT_CODEC: &str = "literal";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MarshalConfig {
    #[serde(default)]
    pub marshal: MarshalSettings,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub traceback: TracebackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MarshalConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| MarshalError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| MarshalError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| MarshalError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables, on top of the defaults.
    ///
    /// Unparseable numeric or boolean values are ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(codec) = std::env::var("REMOTE_MARSHAL_CODEC") {
            config.marshal.default_codec = codec;
        }

        if let Ok(enabled) = std::env::var("REMOTE_MARSHAL_COMPRESSION") {
            if let Some(val) = parse_flag(&enabled) {
                config.compression.enabled = val;
            }
        }

        if let Ok(min_size) = std::env::var("REMOTE_MARSHAL_COMPRESSION_MIN_SIZE") {
            if let Ok(val) = min_size.parse::<usize>() {
                config.compression.min_size = val;
            }
        }

        if let Ok(detailed) = std::env::var("REMOTE_MARSHAL_DETAILED_TRACEBACK") {
            if let Some(val) = parse_flag(&detailed) {
                config.traceback.detailed = val;
            }
        }

        if let Ok(level) = std::env::var("REMOTE_MARSHAL_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MarshalError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| MarshalError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Compression policy described by this configuration.
    pub fn policy(&self) -> CompressionPolicy {
        CompressionPolicy {
            kind: self.compression.kind,
            min_size: self.compression.min_size,
            level: self.compression.level,
            adaptive: self.compression.adaptive,
        }
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.marshal.validate());
        errors.extend(self.compression.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MarshalError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Codec selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarshalSettings {
    /// Registry name of the codec used by `Marshaller::from_config`
    pub default_codec: String,
}

impl Default for MarshalSettings {
    fn default() -> Self {
        Self {
            default_codec: DEFAULT_CODEC.to_string(),
        }
    }
}

impl MarshalSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.default_codec.is_empty() {
            errors.push("Default codec cannot be empty".to_string());
        } else if SerializationFormat::from_name(&self.default_codec).is_none() {
            errors.push(format!(
                "Unknown default codec: '{}' (expected one of: binary, compact, json, literal)",
                self.default_codec
            ));
        }

        errors
    }
}

/// Compression policy settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Whether callers request compression by default
    pub enabled: bool,

    /// Minimum payload size (bytes) before compression is applied
    pub min_size: usize,

    /// Compression algorithm
    pub kind: CompressionKind,

    /// Compression level (zstd only)
    pub level: i32,

    /// Skip compression for payloads that sample as high-entropy
    pub adaptive: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_size: DEFAULT_COMPRESSION_MIN_SIZE,
            kind: CompressionKind::default(),
            level: DEFAULT_ZSTD_LEVEL,
            adaptive: false,
        }
    }
}

impl CompressionConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.kind == CompressionKind::Zstd && !(1..=22).contains(&self.level) {
            errors.push(format!(
                "Invalid compression level: {} (valid range: 1-22)",
                self.level
            ));
        }

        if self.min_size > MAX_PAYLOAD_SIZE {
            errors.push(
                "Compression threshold cannot be larger than max payload size".to_string(),
            );
        }

        errors
    }
}

/// Traceback formatting
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TracebackConfig {
    /// Include a dump of each frame's locals
    pub detailed: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("remote-marshal"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
