//! Deterministic binary serialization for frame bodies.
//!
//! Uses bincode with fixed-size integer encoding, little-endian byte order
//! and trailing-byte rejection, so the same value always encodes to the
//! same bytes on every platform.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Serialize a value to bytes.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    options()
        .serialize(value)
        .map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Deserialize a value from bytes. Trailing bytes are an error.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    options()
        .deserialize(bytes)
        .map_err(|e| CodecError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::frame::{Frame, FramePayload};
    use crate::packet::Prepare;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(
            42,
            FramePayload::Prepare(Prepare {
                destination: Address::new("test.example.alice").unwrap(),
                amount: 123,
                execution_condition: [7u8; 32],
                expires_at: 1_700_000_000_000,
                data: vec![1, 2, 3],
            }),
        );

        let bytes = serialize(&frame).unwrap();
        let recovered: Frame = deserialize(&bytes).unwrap();
        assert_eq!(frame, recovered);
    }

    #[test]
    fn test_determinism() {
        let frame = Frame::new(1, FramePayload::Ack);
        assert_eq!(serialize(&frame).unwrap(), serialize(&frame).unwrap());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = serialize(&Frame::new(1, FramePayload::Ack)).unwrap();
        bytes.push(0xFF);
        assert!(deserialize::<Frame>(&bytes).is_err());
    }

    #[test]
    fn test_invalid_address_rejected_on_decode() {
        // An address travels as its inner string, so raw string bytes stand
        // in for a peer sending a malformed destination.
        let bytes = serialize(&"test..example".to_string()).unwrap();
        assert!(deserialize::<Address>(&bytes).is_err());

        let bytes = serialize(&"test.example.alice".to_string()).unwrap();
        let addr: Address = deserialize(&bytes).unwrap();
        assert_eq!(addr.as_str(), "test.example.alice");
    }

    #[test]
    fn test_garbage_rejected() {
        let garbage = vec![0xFF, 0xFF, 0xFF];
        assert!(deserialize::<Frame>(&garbage).is_err());
    }
}
