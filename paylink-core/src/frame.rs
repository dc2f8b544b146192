//! Transfer-protocol envelope.
//!
//! Every wire exchange is a `Frame`: a request identifier plus a payload.
//! Request identifiers are assigned by the sending side and are unique only
//! within the lifetime of one connection; responses echo the identifier of
//! the request they answer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::packet::{Packet, Prepare};

/// A transfer-level failure answering a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolError {
    /// Short taxonomy code, e.g. `F06`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// Envelope payload variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FramePayload {
    /// First frame on a connection: request admission as an account.
    /// An empty `suffix` asks the server to derive one from the token.
    Auth {
        /// Proposed account suffix (single segment, or empty).
        suffix: String,
        /// Shared auth token.
        token: String,
    },
    /// Successful admission; carries the account's full address.
    AuthOk {
        /// The admitted account's address under the server prefix.
        address: String,
    },
    /// A payment request expecting a correlated `Response`.
    Prepare(Prepare),
    /// Correlated fulfill or reject for an earlier `Prepare`.
    Response(Packet),
    /// Sub-protocol side channel (settlement hooks and the like).
    Message {
        /// Sub-protocol name.
        protocol: String,
        /// Opaque payload.
        data: Vec<u8>,
    },
    /// Empty acknowledgement for a `Message`.
    Ack,
    /// Transfer-level failure of the request with the same identifier.
    Error(ProtocolError),
}

impl FramePayload {
    /// Get a human-readable name for the payload type.
    pub fn name(&self) -> &'static str {
        match self {
            FramePayload::Auth { .. } => "auth",
            FramePayload::AuthOk { .. } => "auth_ok",
            FramePayload::Prepare(_) => "prepare",
            FramePayload::Response(_) => "response",
            FramePayload::Message { .. } => "message",
            FramePayload::Ack => "ack",
            FramePayload::Error(_) => "error",
        }
    }
}

/// One wire exchange unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    /// Correlates requests with their responses within one connection.
    pub request_id: u32,
    /// The payload.
    pub payload: FramePayload,
}

impl Frame {
    /// Build a frame.
    pub fn new(request_id: u32, payload: FramePayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            FramePayload::Auth { suffix, .. } => {
                write!(f, "Auth(id={}, suffix={:?})", self.request_id, suffix)
            }
            FramePayload::AuthOk { address } => {
                write!(f, "AuthOk(id={}, address={})", self.request_id, address)
            }
            FramePayload::Prepare(p) => write!(
                f,
                "Prepare(id={}, dest={}, amount={})",
                self.request_id, p.destination, p.amount
            ),
            FramePayload::Response(p) => {
                write!(f, "Response(id={}, {})", self.request_id, p.name())
            }
            FramePayload::Message { protocol, data } => write!(
                f,
                "Message(id={}, protocol={}, data={}B)",
                self.request_id,
                protocol,
                data.len()
            ),
            FramePayload::Ack => write!(f, "Ack(id={})", self.request_id),
            FramePayload::Error(e) => {
                write!(f, "Error(id={}, code={})", self.request_id, e.code)
            }
        }
    }
}
