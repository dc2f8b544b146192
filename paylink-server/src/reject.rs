//! Error-to-rejection translation.
//!
//! Every packet-path failure crosses the account boundary as a rejection
//! packet, never as a raw internal error. Handler-raised rejections pass
//! their code and message through unchanged; unclassified failures collapse
//! to a taxonomy code with a fixed safe message so internal error text
//! never reaches the peer.

use paylink_core::{Address, Reject, RejectCode};

use crate::error::{HandlerError, ServerError};

/// Message sent for unclassified failures in place of internal error text.
const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Translate an engine error into a rejection packet.
///
/// `triggered_by` is always the server's own address: the rejection is
/// authored locally even when it reports a remote condition.
pub fn reject_for(error: &ServerError, triggered_by: &Address) -> Reject {
    match error {
        ServerError::Handler(HandlerError::Reject { code, message }) => {
            Reject::new(*code, triggered_by.clone(), message.clone())
        }
        ServerError::Unroutable { reason } => {
            Reject::new(RejectCode::BadRequest, triggered_by.clone(), reason.clone())
        }
        ServerError::RequestTimeout => Reject::new(
            RejectCode::PeerUnreachable,
            triggered_by.clone(),
            "request timed out",
        ),
        ServerError::Transport(_) | ServerError::Disconnected => Reject::new(
            RejectCode::PeerUnreachable,
            triggered_by.clone(),
            "peer unreachable",
        ),
        ServerError::AccountNotFound(_) => Reject::new(
            RejectCode::PeerUnreachable,
            triggered_by.clone(),
            "peer unreachable",
        ),
        _ => Reject::new(
            RejectCode::InternalError,
            triggered_by.clone(),
            INTERNAL_ERROR_MESSAGE,
        ),
    }
}
