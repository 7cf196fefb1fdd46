//! Error types for the log console core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No tokio runtime is running")]
    NoRuntime,
}

/// Failures when binding the listening socket
#[derive(Error, Debug)]
pub enum BindError {
    #[error("Address already in use: {0}")]
    AddressInUse(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Server is already running on {0}")]
    AlreadyRunning(String),

    #[error("No tokio runtime is running")]
    NoRuntime,

    #[error("Socket setup failed: {0}")]
    Io(#[from] std::io::Error),
}

impl BindError {
    /// Classify an I/O error raised while binding `endpoint`
    pub fn from_io(endpoint: &str, err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::AddrInUse => BindError::AddressInUse(endpoint.to_string()),
            ErrorKind::AddrNotAvailable | ErrorKind::InvalidInput => {
                BindError::InvalidAddress(endpoint.to_string())
            }
            ErrorKind::PermissionDenied => BindError::PermissionDenied(endpoint.to_string()),
            _ => BindError::Io(err),
        }
    }
}

/// Configuration persistence errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not resolve a configuration directory")]
    NoConfigDir,
}

/// Channel collection errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChannelError {
    #[error("At least one channel is required")]
    Empty,

    #[error("Too many channels: {0} (max {max})", max = crate::constants::MAX_CHANNELS)]
    TooMany(usize),

    #[error("Channel indices must be contiguous from 0, missing {0}")]
    NotContiguous(usize),

    #[error("Duplicate channel index: {0}")]
    Duplicate(usize),

    #[error("Channel not found: {0}")]
    NotFound(usize),
}

/// Reasons a datagram is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty datagram")]
    Empty,

    #[error("Missing index separator")]
    MissingSeparator,

    #[error("Invalid channel index")]
    InvalidIndex,

    #[error("Channel index out of range: {0}")]
    OutOfRange(usize),

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Malformed connector message: {0}")]
    InvalidJson(String),

    #[error("Connector message carries nothing to display")]
    NothingToDisplay,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
