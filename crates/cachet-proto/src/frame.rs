//! Outer envelope frame.
//!
//! An envelope on the wire is a 5-byte prefix followed by the encoded
//! Encryption layer:
//!
//! ```text
//! [magic: 4 bytes "CACH", big-endian][version: 1 byte][body: variable]
//! ```
//!
//! The prefix lets a receiver reject foreign or future-version traffic
//! before handing anything to the CBOR parser.

use bytes::BufMut;

use crate::{
    MAX_PAYLOAD_SIZE,
    errors::{ProtocolError, Result},
};

/// Magic number: "CACH" in ASCII.
pub const MAGIC: u32 = 0x4341_4348;

/// Current envelope version.
pub const VERSION: u8 = 0x01;

/// Size of the fixed prefix.
pub const PREFIX_SIZE: usize = 5;

/// Write `body` behind the frame prefix.
///
/// # Errors
///
/// - `ProtocolError::PayloadTooLarge` if `body` exceeds the size limit
pub fn encode(body: &[u8], dst: &mut impl BufMut) -> Result<()> {
    if body.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: body.len(), max: MAX_PAYLOAD_SIZE });
    }

    dst.put_u32(MAGIC);
    dst.put_u8(VERSION);
    dst.put_slice(body);

    Ok(())
}

/// Validate the frame prefix and return the body.
///
/// # Errors
///
/// - `ProtocolError::FrameTooShort` if the prefix is incomplete
/// - `ProtocolError::InvalidMagic` if the magic number is wrong
/// - `ProtocolError::UnsupportedVersion` for any version but [`VERSION`]
/// - `ProtocolError::PayloadTooLarge` if the body exceeds the size limit
pub fn decode(bytes: &[u8]) -> Result<&[u8]> {
    let Some((prefix, body)) = bytes.split_first_chunk::<PREFIX_SIZE>() else {
        return Err(ProtocolError::FrameTooShort { expected: PREFIX_SIZE, actual: bytes.len() });
    };

    let magic = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    if magic != MAGIC {
        return Err(ProtocolError::InvalidMagic(magic));
    }

    if prefix[4] != VERSION {
        return Err(ProtocolError::UnsupportedVersion(prefix[4]));
    }

    if body.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: body.len(), max: MAX_PAYLOAD_SIZE });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let mut wire = Vec::new();
        encode(b"body", &mut wire).unwrap();

        assert_eq!(&wire[..4], b"CACH");
        assert_eq!(decode(&wire).unwrap(), b"body");
    }

    #[test]
    fn empty_body_is_valid() {
        let mut wire = Vec::new();
        encode(&[], &mut wire).unwrap();

        assert_eq!(wire.len(), PREFIX_SIZE);
        assert_eq!(decode(&wire).unwrap(), b"");
    }

    #[test]
    fn reject_short_frame() {
        assert_eq!(
            decode(b"CAC"),
            Err(ProtocolError::FrameTooShort { expected: PREFIX_SIZE, actual: 3 })
        );
    }

    #[test]
    fn reject_bad_magic() {
        assert!(matches!(decode(b"LOFR\x01body"), Err(ProtocolError::InvalidMagic(_))));
    }

    #[test]
    fn reject_future_version() {
        assert_eq!(decode(b"CACH\x02body"), Err(ProtocolError::UnsupportedVersion(2)));
    }
}
