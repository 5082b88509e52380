//! Error types for Pulsepost

use thiserror::Error;

use crate::types::ContentType;

pub type Result<T> = std::result::Result<T, PulsepostError>;

#[derive(Error, Debug)]
pub enum PulsepostError {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Operation '{operation}' failed after {attempts} attempts: {last_error}")]
    OperationFailed {
        operation: String,
        attempts: u32,
        last_error: PlatformError,
    },

    #[error("Requested {requested} tokens exceeds bucket capacity of {capacity}")]
    CapacityExceeded { requested: u32, capacity: u32 },

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(ContentType),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Backend-reported failures. These are the only errors the retry policy
/// will re-attempt; everything else surfaces to the caller immediately.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Submit failed: {0}")]
    Submit(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
