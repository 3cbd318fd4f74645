//! Opaque credentials and the holder/verifier seams.
//!
//! A credential is an independently verifiable proof token issued elsewhere.
//! The codec never looks inside one. When signing, each held credential is
//! asked by its [`CredentialHolder`] for a presentation over the signing
//! digest; when verifying, each presentation goes to the injected
//! [`CredentialVerifier`] together with the digest recomputed from the
//! received signature. A presentation lifted from one envelope therefore
//! does not verify for different content, subject, time or audit trail.
//!
//! A credentials signature is accepted if at least one presentation
//! verifies for the signature's subject and has not expired.

use std::fmt;

use bytes::Bytes;
use cachet_crypto::Digest;
use cachet_proto::{SubjectId, Timestamp};
use thiserror::Error;

/// Credential presentation as carried in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credential(Bytes);

impl Credential {
    /// Wrap presentation bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Presentation bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// What a verifier learned from a valid credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    /// Subject the credential was issued to
    pub subject: SubjectId,
    /// Time after which the credential is no longer valid
    pub expires: Timestamp,
}

impl VerifiedCredential {
    /// True if the credential is for `subject` and unexpired at `now`.
    pub fn authorizes(&self, subject: &SubjectId, now: Timestamp) -> bool {
        &self.subject == subject && self.expires > now
    }
}

/// Credential presentation or verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Presentation did not verify
    #[error("credential rejected: {reason}")]
    Rejected {
        /// Why the presentation was rejected
        reason: String,
    },

    /// Holder could not produce a presentation
    #[error("credential presentation failed: {reason}")]
    Presentation {
        /// What went wrong
        reason: String,
    },
}

/// Holds one credential and presents it over a message.
pub trait CredentialHolder: Send + Sync + fmt::Debug {
    /// Produce a presentation that proves possession of the credential
    /// bound to `message`.
    fn present(&self, message: &Digest) -> Result<Credential, CredentialError>;
}

/// Verifies credential presentations.
///
/// May block (e.g. on a revocation check).
pub trait CredentialVerifier: Send + Sync {
    /// Verify one presentation over `message` at time `at`.
    fn verify(
        &self,
        credential: &Credential,
        message: &Digest,
        at: Timestamp,
    ) -> Result<VerifiedCredential, CredentialError>;
}

/// Verifier used when none is configured: every presentation is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAllCredentials;

impl CredentialVerifier for RejectAllCredentials {
    fn verify(
        &self,
        _: &Credential,
        _: &Digest,
        _: Timestamp,
    ) -> Result<VerifiedCredential, CredentialError> {
        Err(CredentialError::Rejected { reason: "no credential verifier configured".to_string() })
    }
}
