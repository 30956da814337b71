// SPDX-License-Identifier: MPL-2.0

//! Error types for the photo lifecycle core

use thiserror::Error;

/// Result type alias using AgeError
pub type AgeResult<T> = Result<T, AgeError>;

/// Main error type
///
/// Payloads are plain strings so the error stays `Clone`; memoized pipeline
/// results and completion handles hand out copies of the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgeError {
    /// Operation invoked outside the state it requires
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Argument outside its documented domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Bytes are not a decodable image
    #[error("Decode failed: {0}")]
    DecodeFailure(String),
    /// Image could not be encoded
    #[error("Encode failed: {0}")]
    EncodeFailure(String),
    /// Serialized record could not be parsed
    #[error("Malformed data: {0}")]
    MalformedData(String),
    /// A staged task ran past the stage ceiling
    #[error("Runaway task: exceeded {limit} stages")]
    RunawayTask { limit: u32 },
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(String),
    /// The producer of a completion went away without answering
    #[error("Disconnected: {0}")]
    Disconnected(String),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgeError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        AgeError::InvalidState(msg.into())
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        AgeError::InvalidArgument(msg.into())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AgeError {
    fn from(err: std::io::Error) -> Self {
        AgeError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for AgeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Encoding(e) => AgeError::EncodeFailure(e.to_string()),
            other => AgeError::DecodeFailure(other.to_string()),
        }
    }
}
