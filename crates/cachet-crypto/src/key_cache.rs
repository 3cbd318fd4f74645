//! Memoised symmetric-key wrapping.
//!
//! Wrapping a content key is one modular exponentiation under the
//! recipient's public key (`k^e mod n`); unwrapping is one under the
//! private exponent (`c^d mod n`). A host answering many requests from the
//! same client, or a client reusing a session key, repeats the same
//! exponentiation, so both directions are memoised in bounded LRU maps.
//!
//! Both operations are deterministic, so racing callers converge on the same
//! bytes. The exponentiation runs outside the lock; the lock only guards the
//! map, and a racing insert overwrites an identical value.
//!
//! Map keys are digests over the key fingerprint and the input, so the
//! raw symmetric key never becomes a map key.

use std::{
    fmt,
    num::NonZeroUsize,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use lru::LruCache;
use num_bigint_dig::BigUint;

use crate::{
    cipher::{SYMMETRIC_KEY_SIZE, SymmetricKey},
    error::CryptoError,
    hash::Digest,
    keys::{PrivateKey, PublicKey},
};

const ENCRYPT_LABEL: &[u8] = b"cachet-key-cache-encrypt";
const DECRYPT_LABEL: &[u8] = b"cachet-key-cache-decrypt";

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from either map.
    pub hits: u64,
    /// Lookups that had to exponentiate.
    pub misses: u64,
    /// Entries in the wrap map.
    pub encrypt_entries: usize,
    /// Entries in the unwrap map.
    pub decrypt_entries: usize,
}

/// Bounded, thread-safe memo for symmetric-key wrapping.
///
/// Shared between codec instances via `Arc`.
pub struct KeyCache {
    encrypted: Mutex<LruCache<Digest, Vec<u8>>>,
    decrypted: Mutex<LruCache<Digest, SymmetricKey>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[allow(clippy::expect_used, reason = "mutex poisoning is unrecoverable")]
impl KeyCache {
    /// Create a cache holding up to `capacity` entries per direction.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            encrypted: Mutex::new(LruCache::new(capacity)),
            decrypted: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Wrap `key` under `public`: `k^e mod n`, encoded element-width.
    ///
    /// # Errors
    ///
    /// - `CryptoError::ModulusTooSmall` if the key does not fit below `n`
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn encrypt_key(
        &self,
        public: &PublicKey,
        key: &SymmetricKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let id =
            Digest::of_parts(&[ENCRYPT_LABEL, public.fingerprint().as_bytes(), key.as_bytes()]);

        if let Some(hit) = self.encrypted.lock().expect("key cache mutex poisoned").get(&id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let message = BigUint::from_bytes_be(key.as_bytes());
        let wrapped = public.encode_element(&public.encrypt_raw(&message)?);

        self.encrypted.lock().expect("key cache mutex poisoned").put(id, wrapped.clone());
        Ok(wrapped)
    }

    /// Unwrap `encrypted` with `private`: `c^d mod n`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidLength` if `encrypted` is not element-width
    /// - `CryptoError::DecryptionFailed` if the value is out of range or
    ///   does not unwrap to a 32-byte key
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn decrypt_key(
        &self,
        private: &PrivateKey,
        encrypted: &[u8],
    ) -> Result<SymmetricKey, CryptoError> {
        let public = private.public_key();
        if encrypted.len() != public.element_len() {
            return Err(CryptoError::InvalidLength {
                what: "encrypted symmetric key",
                expected: public.element_len(),
                actual: encrypted.len(),
            });
        }

        let id = Digest::of_parts(&[DECRYPT_LABEL, public.fingerprint().as_bytes(), encrypted]);

        if let Some(hit) = self.decrypted.lock().expect("key cache mutex poisoned").get(&id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let ciphertext = BigUint::from_bytes_be(encrypted);
        let raw = private.decrypt_raw(&ciphertext).map_err(|_| CryptoError::DecryptionFailed {
            reason: "encrypted key is not below the modulus".to_string(),
        })?;

        let bytes = raw.to_bytes_be();
        if bytes.len() > SYMMETRIC_KEY_SIZE {
            return Err(CryptoError::DecryptionFailed {
                reason: "encrypted key does not unwrap to a symmetric key".to_string(),
            });
        }
        let mut padded = [0u8; SYMMETRIC_KEY_SIZE];
        padded[SYMMETRIC_KEY_SIZE - bytes.len()..].copy_from_slice(&bytes);
        let key = SymmetricKey::from_bytes(padded);

        self.decrypted.lock().expect("key cache mutex poisoned").put(id, key.clone());
        Ok(key)
    }

    /// Current counters and sizes.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            encrypt_entries: self.encrypted.lock().expect("key cache mutex poisoned").len(),
            decrypt_entries: self.decrypted.lock().expect("key cache mutex poisoned").len(),
        }
    }

    /// Drop every entry. Counters are kept.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn clear(&self) {
        self.encrypted.lock().expect("key cache mutex poisoned").clear();
        self.decrypted.lock().expect("key cache mutex poisoned").clear();
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
