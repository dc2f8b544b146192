//! Core error types.

use thiserror::Error;

/// Errors from address parsing and manipulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The address is empty.
    #[error("address is empty")]
    Empty,

    /// A segment is empty or contains invalid characters.
    #[error("invalid address segment: {0:?}")]
    InvalidSegment(String),

    /// A suffix must be a single segment (no dots).
    #[error("suffix must be a single segment: {0:?}")]
    MultiSegmentSuffix(String),
}

/// Errors from encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// I/O error while reading or writing the stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize a frame body.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Frame exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Announced frame size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Invalid wire magic bytes.
    #[error("invalid wire magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// The magic this codec accepts.
        expected: [u8; 4],
        /// The bytes actually read.
        actual: [u8; 4],
    },
}
