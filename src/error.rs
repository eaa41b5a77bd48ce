//! Error types for StarSonic

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StarSonicError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Music error: {0}")]
    Music(String),

    #[error("Group not found: {0}")]
    GroupNotFound(u32),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, StarSonicError>;
