// src/error.rs

use obslink_protocol::CloseCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObsLinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Server requires a password but none is configured")]
    MissingCredential,

    #[error("Server speaks RPC version {server}, this client supports {supported}")]
    UnsupportedRpcVersion { server: u32, supported: u32 },

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Handshake error: {0}")]
    Handshake(String),
}

pub type Result<T> = std::result::Result<T, ObsLinkError>;

/// How connection supervision should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Operator must change configuration; do not retry automatically.
    Fatal,
    /// Retry on the reconnect timer.
    Transient,
}

impl ObsLinkError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ObsLinkError::AuthenticationFailed
            | ObsLinkError::MissingCredential
            | ObsLinkError::UnsupportedRpcVersion { .. } => ErrorClass::Fatal,
            _ => ErrorClass::Transient,
        }
    }

    pub fn from_close_code(code: CloseCode, reason: String) -> Self {
        match code {
            CloseCode::AuthenticationFailed => ObsLinkError::AuthenticationFailed,
            CloseCode::UnsupportedRpcVersion => ObsLinkError::UnsupportedRpcVersion {
                server: 0,
                supported: obslink_protocol::RPC_VERSION,
            },
            _ => ObsLinkError::ConnectionClosed(reason),
        }
    }
}
