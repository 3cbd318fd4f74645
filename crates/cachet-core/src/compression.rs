//! Compression layer.
//!
//! Wraps the encoded payload in a `Compression` tuple
//! `(declared length, zstd bytes)`. The compressed bytes, not the raw
//! payload, are what the signature layer signs.
//!
//! # Security
//!
//! Sizes are checked before AND after decompression: the declared length
//! must be within the limit, the decoder never allocates beyond the
//! declared length, and the actual length must match it exactly.

use cachet_proto::{
    Payload,
    wire::{self, Tag},
};
use serde_bytes::ByteBuf;

use crate::error::{EnvelopeError, Layer};

/// Compress `payload` into a `Compression` tuple.
///
/// # Errors
///
/// - `Encoding { layer: Payload }` if the payload cannot be encoded
/// - `Encoding { layer: Compression }` if the encoded payload exceeds
///   `max_size` or zstd fails
pub fn wrap(payload: &Payload, level: i32, max_size: usize) -> Result<Vec<u8>, EnvelopeError> {
    let encoded = payload.encode().map_err(|e| EnvelopeError::encoding(Layer::Payload, e))?;
    if encoded.len() > max_size {
        return Err(EnvelopeError::encoding(
            Layer::Compression,
            format!("payload too large: {} bytes (max {max_size})", encoded.len()),
        ));
    }

    let compressed = zstd::encode_all(encoded.as_slice(), level)
        .map_err(|e| EnvelopeError::encoding(Layer::Compression, e))?;

    wire::encode_tagged(Tag::Compression, &(encoded.len() as u64, ByteBuf::from(compressed)))
        .map_err(|e| EnvelopeError::encoding(Layer::Compression, e))
}

/// Decompress a `Compression` tuple back into a payload.
///
/// # Errors
///
/// - `Encoding { layer: Compression }` on a malformed tuple, a declared
///   length over `max_size`, an undecodable stream, or a length mismatch
/// - `Encoding { layer: Payload }` if the decompressed bytes are not a
///   payload
pub fn unwrap(bytes: &[u8], max_size: usize) -> Result<Payload, EnvelopeError> {
    let (declared, compressed): (u64, ByteBuf) = wire::decode_tagged(Tag::Compression, bytes)
        .map_err(|e| EnvelopeError::encoding(Layer::Compression, e))?;

    let declared = usize::try_from(declared).unwrap_or(usize::MAX);
    if declared > max_size {
        return Err(EnvelopeError::encoding(
            Layer::Compression,
            format!("declared length {declared} exceeds limit {max_size}"),
        ));
    }

    let decompressed = zstd::bulk::decompress(&compressed, declared)
        .map_err(|e| EnvelopeError::encoding(Layer::Compression, e))?;
    if decompressed.len() != declared {
        return Err(EnvelopeError::encoding(
            Layer::Compression,
            format!("length mismatch: declared {declared}, got {}", decompressed.len()),
        ));
    }

    Payload::decode(&decompressed).map_err(|e| EnvelopeError::encoding(Layer::Payload, e))
}
