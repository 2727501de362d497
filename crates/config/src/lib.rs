//! Configuration management for the voice relay
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (VOICE_RELAY_ prefix, `__` separator)
//!
//! The result is a single immutable [`Settings`] tree, validated once at
//! startup. No configuration is read after that point.

pub mod settings;

pub use settings::{
    load_settings, CaptureSettings, GateSettings, LlmSettings, MemorySettings, PlaybackSettings,
    ServerSettings, Settings, SttSettings, TtsSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for voice_relay_core::Error {
    fn from(err: ConfigError) -> Self {
        voice_relay_core::Error::Config(err.to_string())
    }
}
