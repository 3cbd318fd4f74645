//! Symmetric content encryption using `XChaCha20-Poly1305`.
//!
//! All functions are pure - the IV must be provided by the caller. Associated
//! data is authenticated but not encrypted.

use std::fmt;

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Symmetric key size (32 bytes)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// `XChaCha20` nonce size (24 bytes)
pub const IV_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// A 256-bit content key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub const fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse key bytes of exactly [`SYMMETRIC_KEY_SIZE`] length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SYMMETRIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                what: "symmetric key",
                expected: SYMMETRIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// A 24-byte `XChaCha20` initialisation vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    /// Wrap raw IV bytes.
    pub const fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse IV bytes of exactly [`IV_SIZE`] length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; IV_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            what: "initialisation vector",
            expected: IV_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Raw IV bytes.
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}

/// Encrypt `plaintext` under `key` and `iv`, authenticating `aad`.
///
/// Returns ciphertext with the 16-byte Poly1305 tag appended.
///
/// # Security
///
/// - The IV must never repeat under the same key; callers draw it fresh
///   from a CSPRNG per message
/// - Authenticated encryption prevents tampering with the ciphertext and
///   with `aad`
pub fn encrypt(plaintext: &[u8], aad: &[u8], key: &SymmetricKey, iv: &Iv) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let payload = Payload { msg: plaintext, aad };

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(iv.as_bytes()), payload) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    ciphertext
}

/// Decrypt and authenticate `ciphertext` together with `aad`.
///
/// # Errors
///
/// - `DecryptionFailed`: wrong key or IV, tampered ciphertext, or `aad`
///   differing from what was encrypted
pub fn decrypt(
    ciphertext: &[u8],
    aad: &[u8],
    key: &SymmetricKey,
    iv: &Iv,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptionFailed {
            reason: format!("ciphertext shorter than tag: {} bytes", ciphertext.len()),
        });
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let payload = Payload { msg: ciphertext, aad };
    cipher.decrypt(XNonce::from_slice(iv.as_bytes()), payload).map_err(|_| {
        CryptoError::DecryptionFailed { reason: "authentication failed".to_string() }
    })
}
