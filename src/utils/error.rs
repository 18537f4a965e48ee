use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Chunk error: {0}")]
    Chunk(String),

    #[error("AMF error: {0}")]
    Amf(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Create a chunk error
    pub fn chunk(msg: impl Into<String>) -> Self {
        Error::Chunk(msg.into())
    }

    /// Create an AMF error
    pub fn amf(msg: impl Into<String>) -> Self {
        Error::Amf(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Error::Command(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// True for errors that must tear the connection down without a status reply
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Handshake(_) | Error::Chunk(_) | Error::Protocol(_)
        )
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
