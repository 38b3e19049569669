//! Error types for ttsr-player
//!
//! Crate-level error type built with thiserror.
//! Component-level errors (`DecodeError`, `TransportError`) live beside the
//! code that raises them and convert into [`Error`].

use crate::audio::decode::DecodeError;
use crate::session::transport::TransportError;
use thiserror::Error;

/// Main error type for ttsr-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed audio chunk
    #[error("Audio decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Network transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Fallback synthesis errors
    #[error("Fallback synthesis error: {0}")]
    Fallback(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File or process I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of an outbound message failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Shared-library error (config resolution, parsing)
    #[error(transparent)]
    Common(#[from] ttsr_common::Error),
}

/// Convenience Result type using ttsr-player Error
pub type Result<T> = std::result::Result<T, Error>;
