//! # Paylink Core
//!
//! Wire contract for the paylink transfer protocol.
//!
//! This crate provides the pieces shared by the server engine and the
//! client SDK:
//! - Hierarchical dot-segmented addresses
//! - Payment packet variants (prepare, fulfill, reject) and the rejection
//!   taxonomy codes
//! - The transfer-protocol envelope and its length-prefixed framing codec
//! - Deterministic binary serialization
//! - Condition/fulfillment hashing helpers
//!
//! Everything here is pure and stateless; connection and routing state live
//! in `paylink-server`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod condition;
pub mod error;
pub mod frame;
pub mod framing;
pub mod packet;
pub mod serialization;

// Re-export commonly used types at crate root
pub use address::Address;
pub use error::{AddressError, CodecError};
pub use frame::{Frame, FramePayload, ProtocolError};
pub use framing::{FrameCodec, MAX_FRAME_SIZE, WIRE_MAGIC};
pub use packet::{Fulfill, Packet, Prepare, Reject, RejectCode};
