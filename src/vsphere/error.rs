//! Error types for the vSphere client.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors raised by the vSphere client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VsphereError {
    /// Raised when the connection configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the request never produced an HTTP response.
    #[error("request to {url} failed: {message}")]
    Http {
        /// URL being requested.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the server answers with a fault.
    #[error("{fault} (HTTP {status}): {message}")]
    Fault {
        /// HTTP status code.
        status: u16,
        /// Fault type reported by the server (for example `ManagedObjectNotFound`).
        fault: String,
        /// Fault message, sanitised and truncated.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// URL whose response failed to decode.
        url: String,
        /// Decoder message.
        message: String,
    },
    /// Raised when login succeeds without returning a session token.
    #[error("login response carried no session token")]
    MissingSession,
}

impl From<ConfigError> for VsphereError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
