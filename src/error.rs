//! Error types for the clinic API client
//!
//! Every failure the client can produce is normalized into [`ApiError`]:
//! an HTTP-like status (0 when no response was received), a human readable
//! message and the optional payload the server sent back. Callers never see
//! raw transport errors.

use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Classification of an [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response reached the client (DNS, refused connection, timeout)
    Connectivity,
    /// The server answered with a non-success status
    Http,
    /// A 401 that survived a failed, skipped or exhausted refresh attempt
    AuthExpired,
    /// The request could not be constructed locally
    Config,
    /// The credential store could not be read or written
    Storage,
    /// A success response whose body did not match the expected type
    Decode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connectivity => "connectivity error",
            Self::Http => "http error",
            Self::AuthExpired => "authentication expired",
            Self::Config => "configuration error",
            Self::Storage => "storage error",
            Self::Decode => "decode error",
        };
        f.write_str(name)
    }
}

/// Normalized error returned by every client operation
#[derive(Debug, Clone, Error)]
#[error("{kind} (status {status}): {message}")]
pub struct ApiError {
    /// Error classification
    pub kind: ErrorKind,
    /// HTTP status, or 0 when no response was received
    pub status: u16,
    /// Message suitable for display
    pub message: String,
    /// Payload returned by the server, if any
    pub data: Option<Value>,
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create a connectivity error (status 0)
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Connectivity,
            status: 0,
            message: msg.into(),
            data: None,
        }
    }

    /// Create an HTTP error from a server response
    pub fn http(status: u16, msg: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: ErrorKind::Http,
            status,
            message: msg.into(),
            data,
        }
    }

    /// Create a configuration error (status 0)
    pub fn config(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Config,
            status: 0,
            message: msg.into(),
            data: None,
        }
    }

    /// Create a storage error (status 0)
    pub fn storage(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Storage,
            status: 0,
            message: msg.into(),
            data: None,
        }
    }

    /// Create a decode error for a success response with an unexpected body
    pub fn decode(status: u16, msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Decode,
            status,
            message: msg.into(),
            data: None,
        }
    }

    /// Build an error from a non-success response body.
    ///
    /// The message is taken from a `message` or `error` string field when the
    /// body is a JSON object, and falls back to the status reason phrase.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let data = parse_payload(body);
        let message = data
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| reason(status));

        let kind = if status == StatusCode::UNAUTHORIZED {
            ErrorKind::AuthExpired
        } else {
            ErrorKind::Http
        };

        Self {
            kind,
            status: status.as_u16(),
            message,
            data,
        }
    }

    /// Whether the caller should force a new login
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        self.kind == ErrorKind::AuthExpired
    }

    /// Whether the server was never reached
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        self.kind == ErrorKind::Connectivity
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::config(format!("Invalid request: {error}"));
        }
        if error.is_timeout() {
            return Self::connectivity(format!("Request timed out: {error}"));
        }
        Self::connectivity(format!("Unable to reach server: {error}"))
    }
}

impl From<url::ParseError> for ApiError {
    fn from(error: url::ParseError) -> Self {
        Self::config(format!("Invalid URL: {error}"))
    }
}

fn parse_payload(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
}

fn server_message(data: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| data.get(key).and_then(Value::as_str))
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
}
