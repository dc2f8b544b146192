//! Server error types.
//!
//! The taxonomy mirrors how failures propagate: connection-path errors
//! (auth, transport) terminate only the affected connection; packet-path
//! errors are translated into rejections and returned to the caller,
//! never thrown across the account boundary.

use std::io;

use thiserror::Error;

use paylink_core::{CodecError, RejectCode};

use crate::account::AccountId;

/// Admission failures. These close the connection, never silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The proposed suffix is malformed.
    #[error("invalid account suffix {suffix:?}: {reason}")]
    InvalidSuffix {
        /// The suffix as proposed.
        suffix: String,
        /// Why it was refused.
        reason: String,
    },

    /// The suffix is already held by a live connection.
    #[error("account suffix already in use: {0}")]
    DuplicateSuffix(String),

    /// The presented token does not match the server's configured token.
    #[error("invalid auth token")]
    BadToken,

    /// The auth payload itself was malformed.
    #[error("malformed auth payload: {0}")]
    Malformed(String),

    /// No record exists for the connection being admitted.
    #[error("unknown connection")]
    UnknownConnection,
}

/// A failure raised by a local handler collaborator.
///
/// Handlers signal failures as tagged results: a `Reject` carries a
/// recognized taxonomy code and passes through to the peer unchanged,
/// while `Internal` detail stays server-side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Deliberate rejection with a recognized taxonomy code.
    #[error("{code} {message}")]
    Reject {
        /// Taxonomy code to return to the peer.
        code: RejectCode,
        /// Message to return to the peer.
        message: String,
    },

    /// Unclassified handler failure; the text never reaches the peer.
    #[error("handler failure: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Shorthand for an unreachable-destination rejection.
    pub fn unreachable(message: impl Into<String>) -> Self {
        HandlerError::Reject {
            code: RejectCode::Unreachable,
            message: message.into(),
        }
    }
}

/// Engine-level errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Wire encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Admission failed.
    #[error("auth failed: {0}")]
    Auth(#[from] AuthError),

    /// No routing decision could deliver the packet.
    #[error("unroutable destination: {reason}")]
    Unroutable {
        /// Router diagnostic, embedded verbatim in the rejection.
        reason: String,
    },

    /// No response arrived within the time budget.
    #[error("request timed out")]
    RequestTimeout,

    /// The underlying send failed; treated like a timeout by callers.
    #[error("transport error: {0}")]
    Transport(String),

    /// The account's connection closed while a request was outstanding.
    #[error("account disconnected")]
    Disconnected,

    /// A local handler collaborator failed.
    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),

    /// The referenced account is not connected.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// The engine is shutting down.
    #[error("server shutting down")]
    Shutdown,
}

/// Result type for engine operations.
pub type ServerResult<T> = Result<T, ServerError>;
