//! Protocol-level decoding and encoding errors.

use thiserror::Error;

/// Result alias for wire operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while reading or writing wire structures.
///
/// None of these carry cryptographic meaning. A `ProtocolError` always means
/// the bytes were structurally wrong, never that a proof failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than the fixed frame prefix
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Frame magic does not identify a cachet envelope
    #[error("invalid magic: {0:#010x}")]
    InvalidMagic(u32),

    /// Frame version is not supported by this implementation
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Input exceeds the configured size limit
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Tuple carries a tag other than the one the caller asked for
    #[error("unexpected tag: expected {expected:#06x}, got {actual:#06x}")]
    UnexpectedTag {
        /// Tag the decoder expected
        expected: u16,
        /// Tag found on the wire
        actual: u16,
    },

    /// Tuple carries a tag no layer is registered for
    #[error("unknown tag: {0:#06x}")]
    UnknownTag(u16),

    /// Bytes remain after the top-level CBOR item
    #[error("{0} trailing bytes after encoded value")]
    TrailingBytes(usize),

    /// A fixed-width field has the wrong length
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        /// Field name
        field: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// CBOR serialization failed
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode error: {0}")]
    CborDecode(String),
}
