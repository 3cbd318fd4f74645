//! SHA-256 digests.

use std::fmt;

use num_bigint_dig::BigUint;
use sha2::{Digest as _, Sha256};

use crate::error::CryptoError;

/// Digest size in bytes.
pub const HASH_SIZE: usize = 32;

/// Digest size in bits.
pub const HASH_BITS: usize = HASH_SIZE * 8;

/// A SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; HASH_SIZE]);

impl Digest {
    /// Hash a single byte string.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash the concatenation of several byte strings.
    ///
    /// Callers are responsible for making the concatenation unambiguous
    /// (fixed-width parts or length prefixes).
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse digest bytes of exactly [`HASH_SIZE`] length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            what: "digest",
            expected: HASH_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Bytewise XOR of two digests.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        let mut out = [0u8; HASH_SIZE];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        Self(out)
    }

    /// Digest interpreted as a big-endian unsigned integer.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Digest(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        f.write_str("..)")
    }
}
