//! Envelope error taxonomy.
//!
//! Every failure inside the codec surfaces as exactly one of four kinds.
//! Inner-layer errors propagate unchanged through the outer layers, so the
//! kind a caller sees is the kind the failing layer chose.

use std::fmt;

use cachet_proto::{ErrorPayload, HostId, Timestamp};
use thiserror::Error;

/// Envelope layer at which decoding failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Outer frame and encryption tuple
    Encryption,
    /// Signature tuple
    Signature,
    /// Compression tuple and zstd stream
    Compression,
    /// Inner application payload
    Payload,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Encryption => "encryption",
            Self::Signature => "signature",
            Self::Compression => "compression",
            Self::Payload => "payload",
        })
    }
}

/// Errors raised while sealing or opening an envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Malformed bytes, wrong tag, length mismatch, decompression failure,
    /// or an envelope addressed to a host this process does not run
    #[error("encoding error in {layer} layer: {reason}")]
    Encoding {
        /// Layer that failed to decode
        layer: Layer,
        /// What was wrong
        reason: String,
    },

    /// Proof or signature rejected, stale or future timestamp, credential
    /// failure
    #[error("signature error: {reason}")]
    Signature {
        /// Which check failed
        reason: String,
    },

    /// Symmetric key missing, unresolvable recipient key, or content that
    /// fails to authenticate
    #[error("encryption error: {reason}")]
    Encryption {
        /// What was missing or wrong
        reason: String,
    },

    /// Commitment was made under a host key that has since been rotated
    #[error(
        "key rotation: commitment to {host} at {committed_at} no longer matches its active key"
    )]
    KeyRotation {
        /// Host the commitment was registered with
        host: HostId,
        /// When the commitment was made
        committed_at: Timestamp,
    },
}

impl EnvelopeError {
    /// Encoding error at `layer`.
    pub fn encoding(layer: Layer, reason: impl fmt::Display) -> Self {
        Self::Encoding { layer, reason: reason.to_string() }
    }

    /// Signature error.
    pub fn signature(reason: impl fmt::Display) -> Self {
        Self::Signature { reason: reason.to_string() }
    }

    /// Encryption error.
    pub fn encryption(reason: impl fmt::Display) -> Self {
        Self::Encryption { reason: reason.to_string() }
    }

    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encoding { .. } => "encoding",
            Self::Signature { .. } => "signature",
            Self::Encryption { .. } => "encryption",
            Self::KeyRotation { .. } => "key_rotation",
        }
    }

    /// Protocol-level reply for this error, if one can be sent.
    ///
    /// Returns `None` when the outer Encryption layer could not be opened:
    /// without it there is no session to answer on and the exchange is
    /// aborted.
    pub fn reply(&self) -> Option<ErrorPayload> {
        match self {
            Self::Encoding { layer: Layer::Encryption, .. } | Self::Encryption { .. } => None,
            Self::Encoding { .. } => Some(ErrorPayload::encoding(self.to_string())),
            Self::Signature { .. } => Some(ErrorPayload::signature(self.to_string())),
            Self::KeyRotation { .. } => Some(ErrorPayload::key_rotation(self.to_string())),
        }
    }
}
