//! Tagged CBOR tuple codec.
//!
//! Every envelope layer is written as a two-element CBOR array
//! `[tag, (field, field, ...)]`. The tag identifies the layer (and, for
//! signatures, the variant); the inner array holds the layer's fields in a
//! fixed order. Byte-string fields use `serde_bytes` so they stay compact.
//!
//! # Invariants
//!
//! - Exactness: decoding consumes the whole input. Trailing bytes are an
//!   error, so two different byte strings never decode to the same value
//!   from the same prefix.
//! - Size limit: inputs larger than [`crate::MAX_PAYLOAD_SIZE`] are rejected
//!   before the CBOR parser sees them.

use std::io::Cursor;

use ciborium::Value;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    MAX_PAYLOAD_SIZE,
    errors::{ProtocolError, Result},
};

/// Type tag of a wire tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Tag {
    /// Application payload (`tag`, `body`)
    Payload = 0x0001,
    /// Compression layer (`declared length`, `compressed bytes`)
    Compression = 0x0002,
    /// Host signature variant
    HostSignature = 0x0010,
    /// Client (commitment proof) signature variant
    ClientSignature = 0x0011,
    /// Credentials signature variant
    CredentialsSignature = 0x0012,
    /// Standalone commitment (`host`, `time`, `value`)
    Commitment = 0x0020,
    /// Encryption layer, outermost
    Encryption = 0x0030,
    /// Structured protocol error reply
    ErrorReply = 0x0040,
}

impl Tag {
    /// Numeric wire value.
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a numeric wire value.
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Payload),
            0x0002 => Some(Self::Compression),
            0x0010 => Some(Self::HostSignature),
            0x0011 => Some(Self::ClientSignature),
            0x0012 => Some(Self::CredentialsSignature),
            0x0020 => Some(Self::Commitment),
            0x0030 => Some(Self::Encryption),
            0x0040 => Some(Self::ErrorReply),
            _ => None,
        }
    }
}

/// Encode `fields` as a tagged tuple.
///
/// `fields` is expected to be a Rust tuple (serialized as a CBOR array) so
/// that field order, not field names, defines the layout.
pub fn encode_tagged<T: Serialize>(tag: Tag, fields: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&(tag.to_u16(), fields), &mut buf)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}

/// Decode a tagged tuple, requiring a specific tag.
///
/// # Errors
///
/// - `ProtocolError::PayloadTooLarge` if the input exceeds the size limit
/// - `ProtocolError::UnexpectedTag` if the tag differs from `expected`
/// - `ProtocolError::TrailingBytes` if input remains after the tuple
/// - `ProtocolError::CborDecode` if the fields do not match `T`
pub fn decode_tagged<T: DeserializeOwned>(expected: Tag, bytes: &[u8]) -> Result<T> {
    let (tag, value) = decode_raw(bytes)?;
    if tag != expected.to_u16() {
        return Err(ProtocolError::UnexpectedTag { expected: expected.to_u16(), actual: tag });
    }

    deserialize_fields(&value)
}

/// Decode a tagged tuple whose tag is not known in advance.
///
/// Returns the tag and the still-undecoded fields; pass the fields to
/// [`deserialize_fields`] once the tag has selected a type.
pub fn decode_any(bytes: &[u8]) -> Result<(Tag, Value)> {
    let (tag, value) = decode_raw(bytes)?;
    let tag = Tag::from_u16(tag).ok_or(ProtocolError::UnknownTag(tag))?;
    Ok((tag, value))
}

/// Deserialize fields previously returned by [`decode_any`].
pub fn deserialize_fields<T: DeserializeOwned>(value: &Value) -> Result<T> {
    value.deserialized().map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

fn decode_raw(bytes: &[u8]) -> Result<(u16, Value)> {
    if bytes.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: bytes.len(), max: MAX_PAYLOAD_SIZE });
    }

    let mut cursor = Cursor::new(bytes);
    let (tag, value): (u16, Value) = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| ProtocolError::CborDecode(e.to_string()))?;

    let consumed = cursor.position() as usize;
    if consumed != bytes.len() {
        return Err(ProtocolError::TrailingBytes(bytes.len() - consumed));
    }

    Ok((tag, value))
}

#[cfg(test)]
mod tests {
    use serde_bytes::ByteBuf;

    use super::*;

    #[test]
    fn tagged_round_trip() {
        let fields = (7u64, Some(ByteBuf::from(vec![1, 2, 3])), "host".to_string());
        let bytes = encode_tagged(Tag::Compression, &fields).unwrap();

        let decoded: (u64, Option<ByteBuf>, String) =
            decode_tagged(Tag::Compression, &bytes).unwrap();
        assert_eq!(decoded, fields);
    }

    #[test]
    fn reject_wrong_tag() {
        let bytes = encode_tagged(Tag::Payload, &(1u16, ByteBuf::new())).unwrap();
        let result: Result<(u16, ByteBuf)> = decode_tagged(Tag::Encryption, &bytes);

        assert_eq!(
            result,
            Err(ProtocolError::UnexpectedTag {
                expected: Tag::Encryption.to_u16(),
                actual: Tag::Payload.to_u16(),
            })
        );
    }

    #[test]
    fn reject_trailing_bytes() {
        let mut bytes = encode_tagged(Tag::Payload, &(1u16, ByteBuf::new())).unwrap();
        bytes.extend_from_slice(&[0, 0]);

        let result: Result<(u16, ByteBuf)> = decode_tagged(Tag::Payload, &bytes);
        assert_eq!(result, Err(ProtocolError::TrailingBytes(2)));
    }

    #[test]
    fn reject_unknown_tag() {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&(0x7777u16, (1u8,)), &mut buf).unwrap();

        assert!(matches!(decode_any(&buf), Err(ProtocolError::UnknownTag(0x7777))));
    }

    #[test]
    fn reject_mismatched_field_types() {
        let bytes = encode_tagged(Tag::Payload, &("not a number", 3u8)).unwrap();
        let result: Result<(u16, ByteBuf)> = decode_tagged(Tag::Payload, &bytes);

        assert!(matches!(result, Err(ProtocolError::CborDecode(_))));
    }

    #[test]
    fn tag_values_round_trip() {
        for tag in [
            Tag::Payload,
            Tag::Compression,
            Tag::HostSignature,
            Tag::ClientSignature,
            Tag::CredentialsSignature,
            Tag::Commitment,
            Tag::Encryption,
            Tag::ErrorReply,
        ] {
            assert_eq!(Tag::from_u16(tag.to_u16()), Some(tag));
        }
    }
}
