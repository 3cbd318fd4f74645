//! Structured protocol-level error replies.
//!
//! When a host can open an envelope but rejects its contents (bad signature,
//! stale proof, undecodable payload, rotated key) it answers with an
//! `ErrorPayload` instead of dropping the connection. The reply travels as an
//! ordinary payload tagged [`PayloadTag::ERROR_REPLY`].

use crate::{
    Payload, PayloadTag,
    errors::Result,
    wire::{self, Tag},
};

/// Error reply: kind code plus a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Error kind code.
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorPayload {
    /// Malformed bytes, wrong tag, length mismatch, decompression failure.
    pub const ENCODING_ERROR: u16 = 0x0001;
    /// Proof or signature rejected, stale timestamp, credential failure.
    pub const SIGNATURE_ERROR: u16 = 0x0002;
    /// Symmetric key missing or unresolvable.
    pub const ENCRYPTION_ERROR: u16 = 0x0003;
    /// Commitment refers to a rotated host key; the client must re-commit.
    pub const KEY_ROTATION_ERROR: u16 = 0x0004;

    /// Create an encoding error reply.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self { code: Self::ENCODING_ERROR, message: message.into() }
    }

    /// Create a signature error reply.
    pub fn signature(message: impl Into<String>) -> Self {
        Self { code: Self::SIGNATURE_ERROR, message: message.into() }
    }

    /// Create an encryption error reply.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self { code: Self::ENCRYPTION_ERROR, message: message.into() }
    }

    /// Create a key rotation error reply.
    pub fn key_rotation(message: impl Into<String>) -> Self {
        Self { code: Self::KEY_ROTATION_ERROR, message: message.into() }
    }

    /// Encode as an `ErrorReply` tuple: `(code, message)`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        wire::encode_tagged(Tag::ErrorReply, &(self.code, &self.message))
    }

    /// Decode an `ErrorReply` tuple.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (code, message): (u16, String) = wire::decode_tagged(Tag::ErrorReply, bytes)?;
        Ok(Self { code, message })
    }

    /// Wrap into a payload for sending through the envelope codec.
    pub fn into_payload(self) -> Result<Payload> {
        Ok(Payload::new(PayloadTag::ERROR_REPLY, self.encode()?))
    }

    /// Extract an error reply from a payload, if it is one.
    pub fn from_payload(payload: &Payload) -> Option<Result<Self>> {
        (payload.tag() == PayloadTag::ERROR_REPLY).then(|| Self::decode(payload.body()))
    }
}
