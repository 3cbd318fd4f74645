//! Error types for cachet cryptographic primitives.

use thiserror::Error;

/// Errors from key handling, proofs and symmetric encryption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key components are inconsistent or out of range
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// Which check failed
        reason: String,
    },

    /// Modulus too small for the requested operation
    #[error("modulus too small: {bits} bits, need more than {required}")]
    ModulusTooSmall {
        /// Modulus size in bits
        bits: usize,
        /// Minimum size in bits (exclusive)
        required: usize,
    },

    /// Value is not an element of the key's group
    #[error("value is not an element of the group")]
    InvalidGroupElement,

    /// Fixed-width input has the wrong length
    #[error("invalid length for {what}: expected {expected}, got {actual}")]
    InvalidLength {
        /// What was being parsed
        what: &'static str,
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Encoding admits a shorter or unsigned form
    #[error("non-canonical encoding of {what}")]
    NonCanonical {
        /// What was being parsed
        what: &'static str,
    },

    /// Proof bound cannot mask the secret
    #[error("proof bound of {bound} bits is too small, need at least {required}")]
    ProofBoundTooSmall {
        /// Configured bound
        bound: usize,
        /// Bound needed for this secret
        required: usize,
    },

    /// Proof response exceeds the bit-length bound
    #[error("proof response has {bits} bits, bound is {bound}")]
    ResponseTooLarge {
        /// Bit length of the response
        bits: usize,
        /// Configured bound
        bound: usize,
    },

    /// Recomputed commitment does not hash to the challenge
    #[error("proof challenge mismatch")]
    ChallengeMismatch,

    /// Host signature does not verify under the public key
    #[error("signature verification failed")]
    InvalidSignature,

    /// Symmetric decryption or key unwrapping failed
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Why decryption failed
        reason: String,
    },
}
