//! Length-prefixed frame framing codec.
//!
//! Frames are laid out as:
//! - 4 bytes: wire magic
//! - 4 bytes: big-endian body length
//! - N bytes: bincode-serialized `Frame`

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::frame::Frame;
use crate::serialization;

/// Wire magic identifying the paylink transfer protocol.
pub const WIRE_MAGIC: [u8; 4] = [0x50, 0x4C, 0x4E, 0x4B]; // "PLNK"

/// Maximum frame body size in bytes (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Header size: 4 bytes magic + 4 bytes length.
const HEADER_SIZE: usize = 8;

/// Codec for length-prefixed frame framing.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Body length of the current frame, once its header has been read.
    current_length: Option<usize>,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        Self {
            current_length: None,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let length = match self.current_length {
            Some(length) => length,
            None => {
                if src.len() < HEADER_SIZE {
                    return Ok(None);
                }

                let mut magic = [0u8; 4];
                magic.copy_from_slice(&src[0..4]);
                if magic != WIRE_MAGIC {
                    return Err(CodecError::InvalidMagic {
                        expected: WIRE_MAGIC,
                        actual: magic,
                    });
                }

                let mut len_bytes = [0u8; 4];
                len_bytes.copy_from_slice(&src[4..8]);
                let length = u32::from_be_bytes(len_bytes) as usize;

                if length > MAX_FRAME_SIZE {
                    return Err(CodecError::FrameTooLarge {
                        size: length,
                        max: MAX_FRAME_SIZE,
                    });
                }

                self.current_length = Some(length);
                length
            }
        };

        if src.len() < HEADER_SIZE + length {
            src.reserve(HEADER_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let body = src.split_to(length);
        self.current_length = None;

        let frame: Frame = serialization::deserialize(&body)?;
        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serialization::serialize(&frame)?;
        let length = body.len();

        if length > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: length,
                max: MAX_FRAME_SIZE,
            });
        }

        dst.reserve(HEADER_SIZE + length);
        dst.put_slice(&WIRE_MAGIC);
        dst.put_u32(length as u32);
        dst.put_slice(&body);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FramePayload;

    #[test]
    fn test_roundtrip() {
        let mut codec = FrameCodec::new();
        let original = Frame::new(
            9,
            FramePayload::Message {
                protocol: "settle".to_string(),
                data: vec![1, 2, 3],
            },
        );

        let mut buf = BytesMut::new();
        codec.encode(original.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, original);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&WIRE_MAGIC);
        // Only 4 bytes, not enough for the header

        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_partial_body() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        buf.put_slice(&WIRE_MAGIC);
        buf.put_u32(100);
        buf.put_slice(&[0u8; 50]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_invalid_magic() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        buf.put_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        buf.put_u32(10);
        buf.put_slice(&[0u8; 10]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::InvalidMagic { .. })));
    }

    #[test]
    fn test_frame_too_large() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        buf.put_slice(&WIRE_MAGIC);
        buf.put_u32((MAX_FRAME_SIZE + 1) as u32);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(Frame::new(1, FramePayload::Ack), &mut buf).unwrap();
        codec
            .encode(
                Frame::new(
                    2,
                    FramePayload::AuthOk {
                        address: "test.example.alice".to_string(),
                    },
                ),
                &mut buf,
            )
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.request_id, 1);

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.request_id, 2);

        assert!(buf.is_empty());
    }
}
