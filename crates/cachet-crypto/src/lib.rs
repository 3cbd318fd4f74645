//! Cryptographic building blocks for cachet envelopes.
//!
//! Everything here is pure: no clock, no logging, no ambient randomness.
//! Operations that need randomness (IVs, proof nonces, secrets, key
//! generation) take it from the caller, so tests can be fully deterministic.
//!
//! # Key lifecycle
//!
//! ```text
//! PrivateKey::generate ──► host publishes PublicKey (n, e, g) in its key chain
//!                              │
//!          client: Secret ──► commit(g^x) ──► registers Commitment with host
//!                              │
//!          client signs: prove(x, H(message))     host verifies: verify(g^x, ...)
//!
//! content keys:  KeyCache::encrypt_key(pub, k) = k^e mod n
//!                KeyCache::decrypt_key(priv, c) = c^d mod n
//! ```
//!
//! Rotating a host key invalidates commitments made under the previous key
//! for new signatures; old ones remain verifiable against the historical
//! key.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod commitment;
pub mod error;
pub mod hash;
pub mod key_cache;
pub mod keys;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cipher::{IV_SIZE, Iv, SYMMETRIC_KEY_SIZE, SymmetricKey};
pub use commitment::{Proof, ProofParams, STATISTICAL_MARGIN_BITS, Secret};
pub use error::CryptoError;
pub use hash::{Digest, HASH_BITS, HASH_SIZE};
pub use key_cache::{CacheStats, KeyCache};
pub use keys::{PrivateKey, PublicKey};
pub use num_bigint_dig::BigUint;
