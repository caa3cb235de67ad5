//! Error types for the gateway protocol.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes reported to clients.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request line or invalid field values.
    InvalidRequest,
    /// Nothing was received before the connection closed.
    EmptyRequest,
    /// Request exceeded the maximum line size.
    RequestTooLarge,
    /// Client did not send a complete request in time.
    ReadTimeout,
    /// Engine is known but not enabled on this gateway.
    UnsupportedEngine,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::EmptyRequest => write!(f, "EMPTY_REQUEST"),
            Self::RequestTooLarge => write!(f, "REQUEST_TOO_LARGE"),
            Self::ReadTimeout => write!(f, "READ_TIMEOUT"),
            Self::UnsupportedEngine => write!(f, "UNSUPPORTED_ENGINE"),
        }
    }
}

/// Request-side protocol error.
///
/// The message is a single human-readable line sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ProtocolError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create an INVALID_REQUEST error for an unrecognised engine name.
    pub fn unknown_engine(name: &str) -> Self {
        Self::invalid_request(format!(
            "unknown engine '{}' (expected one of: spark, mpi)",
            name.trim()
        ))
    }

    /// Create an UNSUPPORTED_ENGINE error.
    pub fn unsupported_engine(name: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedEngine,
            format!("engine '{}' is not enabled on this gateway", name),
        )
    }

    /// Create an EMPTY_REQUEST error.
    pub fn empty_request() -> Self {
        Self::new(ErrorCode::EmptyRequest, "no data received")
    }

    /// Create a REQUEST_TOO_LARGE error.
    pub fn too_large(max: usize) -> Self {
        Self::new(
            ErrorCode::RequestTooLarge,
            format!("request exceeds maximum size of {} bytes", max),
        )
    }

    /// Create a READ_TIMEOUT error.
    pub fn read_timeout() -> Self {
        Self::new(ErrorCode::ReadTimeout, "timed out waiting for request")
    }
}
