// src/utils/error.rs
use serde_json;
use std::io;
use thiserror::Error;
use url;

/// Main error type for the mining application
///
/// This enum represents all possible error conditions that can occur
/// during mining operations, including network, I/O, protocol, backend and
/// configuration errors.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Errors raised while constructing or running a search backend
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// Errors in protocol handling or invalid protocol messages
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),

    /// The operation was abandoned because its session was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Async task or thread execution errors
    #[error("Task execution error: {0}")]
    TaskError(String),

    /// OpenCL platform, build or queue errors
    #[cfg(feature = "opencl")]
    #[error("OpenCL error: {0}")]
    OclError(#[from] ocl::Error),
}

/// Converts hex decoding errors into MinerError
///
/// Used when invalid hex data is encountered in getwork `data`/`target`
/// fields or in fixture headers. Wraps the original error in an `InputError`
/// variant.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::InputError(format!("Hex conversion failed: {}", e))
    }
}

/// Converts TOML parse errors into MinerError
impl From<toml::de::Error> for MinerError {
    fn from(e: toml::de::Error) -> Self {
        MinerError::ConfigError(format!("Invalid config format: {}", e))
    }
}

/// Converts async task join errors into MinerError
///
/// Used when pool watcher tasks fail unexpectedly.
/// Wraps the original error in a `TaskError` variant.
impl From<tokio::task::JoinError> for MinerError {
    fn from(e: tokio::task::JoinError) -> Self {
        MinerError::TaskError(format!("Async task failed: {}", e))
    }
}

impl MinerError {
    /// Whether the error is worth retrying against the same or another pool
    ///
    /// Configuration mistakes and cancellation are not; everything that
    /// comes from the wire is.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            MinerError::ConfigError(_) | MinerError::Cancelled | MinerError::BackendError(_)
        )
    }
}
