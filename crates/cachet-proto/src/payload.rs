//! Opaque typed application payload.
//!
//! The envelope never looks inside a payload. It carries the declared type
//! tag so the receiving handler can dispatch, and the body bytes exactly as
//! the application's own codec produced them.

use bytes::Bytes;
use serde_bytes::ByteBuf;

use crate::{
    errors::Result,
    wire::{self, Tag},
};

/// Declared type of a payload, assigned by the application protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadTag(pub u16);

impl PayloadTag {
    /// Reserved tag for [`crate::ErrorPayload`] replies.
    pub const ERROR_REPLY: Self = Self(0xFFFF);
}

/// Immutable blob plus its declared type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    tag: PayloadTag,
    body: Bytes,
}

impl Payload {
    /// Create a payload.
    pub fn new(tag: PayloadTag, body: impl Into<Bytes>) -> Self {
        Self { tag, body: body.into() }
    }

    /// Declared type tag.
    pub fn tag(&self) -> PayloadTag {
        self.tag
    }

    /// Body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Encode as a `Payload` tuple: `(tag, body)`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        wire::encode_tagged(Tag::Payload, &(self.tag.0, serde_bytes::Bytes::new(&self.body)))
    }

    /// Decode a `Payload` tuple.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if the bytes are not exactly one `Payload` tuple
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (tag, body): (u16, ByteBuf) = wire::decode_tagged(Tag::Payload, bytes)?;
        Ok(Self { tag: PayloadTag(tag), body: Bytes::from(body.into_vec()) })
    }
}
