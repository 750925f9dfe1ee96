//! Error types for camera session orchestration

use thiserror::Error;

use crate::identity::SessionId;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a [`Camera`](crate::Camera) backend
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// Media profile or session description negotiation failed
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Media transport failed while streaming
    #[error("Transport error: {0}")]
    Transport(String),

    /// Releasing the device failed
    #[error("Close error: {0}")]
    Close(String),
}

/// Error taxonomy of the session lifecycle
#[derive(Debug, Error)]
pub enum Error {
    /// The stream request cannot be turned into a session
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The camera failed before its session description was available
    #[error("Stream startup failed: {0}")]
    StartupFailure(String),

    /// No live session carries this identity
    #[error("Camera stream not found: {0}")]
    StreamNotFound(SessionId),

    /// The camera refused to release its resources
    #[error("Could not close stream: {0}")]
    CouldNotCloseStream(String),

    /// The camera failed after streaming had begun
    #[error("Stream failed: {0}")]
    RuntimeStreamFailure(String),

    /// A session with the same identity is already live
    #[error("Camera stream already active: {0}")]
    SessionAlreadyActive(SessionId),

    /// The registry is at capacity
    #[error("Session limit reached ({0} active)")]
    SessionLimitReached(usize),
}

impl Error {
    /// Stable name of the error kind, as reported to callers and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "InvalidConfiguration",
            Error::StartupFailure(_) => "StartupFailure",
            Error::StreamNotFound(_) => "StreamNotFound",
            Error::CouldNotCloseStream(_) => "CouldNotCloseStream",
            Error::RuntimeStreamFailure(_) => "RuntimeStreamFailure",
            Error::SessionAlreadyActive(_) => "SessionAlreadyActive",
            Error::SessionLimitReached(_) => "SessionLimitReached",
        }
    }
}
