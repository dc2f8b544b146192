//! Payment packet variants.
//!
//! A payment exchange is a three-phase protocol: a `Prepare` request travels
//! toward its destination, and exactly one of `Fulfill` (success) or
//! `Reject` (failure) travels back. Packet `data` fields are opaque
//! pass-through bytes, never inspected by the routing layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Fixed taxonomy of rejection codes understood by both ends.
///
/// Codes are a two-letter class plus two digits: `F`-class codes are final
/// (retrying is pointless), `T`-class codes are temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectCode {
    /// `F00` - malformed or unroutable request.
    BadRequest,
    /// `F02` - destination cannot be reached.
    Unreachable,
    /// `F06` - sender is not authorized for this operation.
    Unauthorized,
    /// `T00` - unclassified server-side failure.
    InternalError,
    /// `T01` - peer temporarily unreachable; the request may be retried.
    PeerUnreachable,
}

impl RejectCode {
    /// The wire code, e.g. `F02`.
    pub fn code(&self) -> &'static str {
        match self {
            RejectCode::BadRequest => "F00",
            RejectCode::Unreachable => "F02",
            RejectCode::Unauthorized => "F06",
            RejectCode::InternalError => "T00",
            RejectCode::PeerUnreachable => "T01",
        }
    }

    /// Parse a wire code back into the taxonomy.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F00" => Some(RejectCode::BadRequest),
            "F02" => Some(RejectCode::Unreachable),
            "F06" => Some(RejectCode::Unauthorized),
            "T00" => Some(RejectCode::InternalError),
            "T01" => Some(RejectCode::PeerUnreachable),
            _ => None,
        }
    }

    /// Whether the failure is final (an `F`-class code).
    pub fn is_final(&self) -> bool {
        self.code().starts_with('F')
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A payment request awaiting fulfillment or rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prepare {
    /// Destination address for the payment.
    pub destination: Address,
    /// Amount in the smallest ledger unit.
    pub amount: u64,
    /// SHA-256 condition the fulfillment must hash to.
    pub execution_condition: [u8; 32],
    /// Expiry as Unix milliseconds.
    pub expires_at: u64,
    /// Opaque end-to-end data.
    pub data: Vec<u8>,
}

/// Successful completion of a prepare.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fulfill {
    /// Preimage of the prepare's execution condition.
    pub fulfillment: [u8; 32],
    /// Opaque end-to-end data.
    pub data: Vec<u8>,
}

/// Failed completion of a prepare.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reject {
    /// Taxonomy code classifying the failure.
    pub code: RejectCode,
    /// Address of the node that authored this rejection.
    pub triggered_by: Address,
    /// Human-readable failure message.
    pub message: String,
    /// Opaque auxiliary data, passed through uninspected.
    pub data: Vec<u8>,
}

impl Reject {
    /// Build a rejection with empty auxiliary data.
    pub fn new(code: RejectCode, triggered_by: Address, message: impl Into<String>) -> Self {
        Self {
            code,
            triggered_by,
            message: message.into(),
            data: Vec::new(),
        }
    }
}

/// All payment packet variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Packet {
    /// A payment request.
    Prepare(Prepare),
    /// Successful completion.
    Fulfill(Fulfill),
    /// Failed completion.
    Reject(Reject),
}

impl Packet {
    /// Get a human-readable name for the packet type.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Prepare(_) => "prepare",
            Packet::Fulfill(_) => "fulfill",
            Packet::Reject(_) => "reject",
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::Prepare(p) => write!(
                f,
                "Prepare(dest={}, amount={}, data={}B)",
                p.destination,
                p.amount,
                p.data.len()
            ),
            Packet::Fulfill(p) => write!(f, "Fulfill(data={}B)", p.data.len()),
            Packet::Reject(r) => {
                write!(f, "Reject(code={}, triggered_by={})", r.code, r.triggered_by)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [
            RejectCode::BadRequest,
            RejectCode::Unreachable,
            RejectCode::Unauthorized,
            RejectCode::InternalError,
            RejectCode::PeerUnreachable,
        ] {
            assert_eq!(RejectCode::from_code(code.code()), Some(code));
        }
        assert_eq!(RejectCode::from_code("Z99"), None);
    }

    #[test]
    fn test_code_class() {
        assert!(RejectCode::Unreachable.is_final());
        assert!(!RejectCode::PeerUnreachable.is_final());
    }

    #[test]
    fn test_packet_names() {
        let reject = Reject::new(
            RejectCode::Unreachable,
            Address::new("test.example").unwrap(),
            "cannot be reached",
        );
        assert_eq!(Packet::Reject(reject).name(), "reject");
    }
}
