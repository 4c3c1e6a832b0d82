//! Error types for speechgate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechgateError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Frame classification errors
    #[error("Frame classification failed: {message}")]
    Classification { message: String },

    // Backend errors
    #[error("Backend connection failed: {message}")]
    BackendConnection { message: String },

    #[error("Backend protocol error: {message}")]
    BackendProtocol { message: String },

    #[error("Backend request timed out after {timeout_ms}ms")]
    BackendTimeout { timeout_ms: u64 },

    // Session errors
    #[error("Unknown session: {id}")]
    SessionNotFound { id: u64 },

    #[error("Session {id} is shutting down")]
    SessionClosed { id: u64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SpeechgateError>;
