//! Chat bridge error types.

use thiserror::Error;

/// Errors raised by a room session or the backend transport beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The backend stream could not be opened.
    #[error("backend connect failed: {0}")]
    Connect(String),

    /// The backend did not accept the stream in time.
    #[error("backend connect timed out after {0} seconds")]
    ConnectTimeout(u64),

    /// Reading from or writing to the backend stream failed.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// A client event could not be encoded or a server event decoded.
    #[error("backend codec error: {0}")]
    Codec(String),

    /// The backend closed its side of the stream.
    #[error("backend stream ended")]
    Ended,

    /// The owning connection is tearing down.
    #[error("session cancelled")]
    Cancelled,

    /// The session is closed; no further operations are accepted.
    #[error("session closed")]
    Closed,

    /// The operation is not allowed in the session's current state.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),
}

/// Why a relay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnd {
    /// The client sent a close frame or the connection reached EOF.
    ClientClosed,
    /// Reading from the client failed.
    ClientError(String),
    /// The client sent nothing within the idle window.
    IdleTimeout,
    /// Writing to the client failed.
    WriteFailed(String),
    /// The session failed or ended.
    Session(SessionError),
    /// The supervisor cancelled the connection.
    Cancelled,
}

impl RelayEnd {
    /// Whether this ending is an ordinary disconnect rather than a fault.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::ClientClosed | Self::Cancelled)
    }
}

impl std::fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "client closed"),
            Self::ClientError(e) => write!(f, "client read error: {}", e),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::WriteFailed(e) => write!(f, "client write error: {}", e),
            Self::Session(e) => write!(f, "{}", e),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
