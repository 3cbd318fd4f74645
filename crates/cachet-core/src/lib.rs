//! Cachet envelope core.
//!
//! Turns a typed application [`Payload`](cachet_proto::Payload) into a
//! confidential, tamper-evident, replay-resistant envelope and back.
//!
//! # Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ frame: "CACH" + version                     │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │ Encryption (time, recipient, key, iv)   │ │
//! │ │ ┌─────────────────────────────────────┐ │ │
//! │ │ │ Signature (Host | Client | Creds)   │ │ │
//! │ │ │ ┌─────────────────────────────────┐ │ │ │
//! │ │ │ │ Compression (len, zstd)         │ │ │ │
//! │ │ │ │ ┌─────────────────────────────┐ │ │ │ │
//! │ │ │ │ │ Payload (tag, body)         │ │ │ │ │
//! │ │ │ │ └─────────────────────────────┘ │ │ │ │
//! │ │ │ └─────────────────────────────────┘ │ │ │
//! │ │ └─────────────────────────────────────┘ │ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The signature covers the compressed bytes, so the bytes that are hashed
//! are exactly the bytes that are decompressed.
//!
//! # Collaborators
//!
//! - [`KeyChain`]: `(host, time)` to host keys; may block
//! - [`CredentialHolder`] / [`CredentialVerifier`]: opaque credentials
//!   presented over the signing digest; verification may block
//! - [`Environment`]: wall clock and randomness
//!
//! # Errors
//!
//! Every failure is one [`EnvelopeError`] kind. Failures past the
//! Encryption layer can be answered with
//! [`EnvelopeCodec::reply_with_error`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod commitment;
pub mod compression;
pub mod config;
pub mod credentials;
pub mod encryption;
pub mod env;
pub mod error;
pub mod keychain;
pub mod signature;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use codec::{DecodedEnvelope, EnvelopeCodec, OpenedEnvelope};
pub use commitment::{Commitment, SecretCommitment};
pub use config::{CodecConfig, ConfigError};
pub use credentials::{
    Credential, CredentialError, CredentialHolder, CredentialVerifier, RejectAllCredentials,
    VerifiedCredential,
};
pub use encryption::{CryptoContext, DecryptionContext, Encryption};
pub use env::{Environment, SystemEnv};
pub use error::{EnvelopeError, Layer};
pub use keychain::{KeyChain, KeyChainError, MemoryKeyChain};
pub use signature::{
    Agent, AuthContext, AuthMethod, Authority, Signature, SignatureProof, Variant,
    VerifiedSignature, VerifyContext,
};
