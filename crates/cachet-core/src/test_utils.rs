//! Deterministic collaborators for tests.

#![allow(clippy::expect_used, reason = "lock poisoning is unrecoverable in tests")]

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use cachet_crypto::{Digest, HASH_SIZE};
use cachet_proto::{SubjectId, Timestamp};
use rand_chacha::{
    ChaCha20Rng,
    rand_core::{RngCore, SeedableRng},
};

use crate::{
    credentials::{
        Credential, CredentialError, CredentialHolder, CredentialVerifier, VerifiedCredential,
    },
    env::Environment,
};

/// Default virtual clock start: 2023-11-14.
pub const MOCK_START: Timestamp = Timestamp::from_secs(1_700_000_000);

/// Environment with a seeded RNG and a virtual clock.
///
/// Clones share the RNG stream and the clock.
#[derive(Clone)]
pub struct MockEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock: Arc<AtomicU64>,
}

impl MockEnv {
    /// Seeded environment starting at [`MOCK_START`].
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicU64::new(MOCK_START.as_secs())),
        }
    }

    /// Set the virtual clock.
    pub fn set_time(&self, time: Timestamp) {
        self.clock.store(time.as_secs(), Ordering::SeqCst);
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        self.clock.fetch_add(duration.as_secs(), Ordering::SeqCst);
    }
}

impl Environment for MockEnv {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.clock.load(Ordering::SeqCst))
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("mock rng poisoned").fill_bytes(buffer);
    }
}

const TOKEN_ID_LABEL: &[u8] = b"cachet-test-credential-id";
const PRESENTATION_LABEL: &[u8] = b"cachet-test-credential-presentation";

/// Held token whose presentation is `id || H(token, message)`.
///
/// Presenting requires the token itself; the presentation reveals only its
/// digest-derived id.
#[derive(Clone)]
pub struct FixedToken {
    token: Bytes,
}

impl FixedToken {
    /// Hold `token`.
    pub fn new(token: impl Into<Bytes>) -> Self {
        Self { token: token.into() }
    }

    /// Hold `token` behind the holder trait object [`AuthContext`] takes.
    ///
    /// [`AuthContext`]: crate::AuthContext
    pub fn shared(token: impl Into<Bytes>) -> Arc<dyn CredentialHolder> {
        Arc::new(Self::new(token))
    }
}

impl fmt::Debug for FixedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FixedToken(<redacted>)")
    }
}

impl CredentialHolder for FixedToken {
    fn present(&self, message: &Digest) -> Result<Credential, CredentialError> {
        let id = token_id(&self.token);
        let proof = presentation_proof(&self.token, message);

        let mut bytes = Vec::with_capacity(2 * HASH_SIZE);
        bytes.extend_from_slice(id.as_bytes());
        bytes.extend_from_slice(proof.as_bytes());
        Ok(Credential::new(bytes))
    }
}

/// Credential verifier backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct FixedCredentials {
    tokens: HashMap<Digest, (Bytes, VerifiedCredential)>,
}

impl FixedCredentials {
    /// Empty table; every presentation is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept presentations of `token` as issued to `subject` until
    /// `expires`.
    #[must_use]
    pub fn accept(
        mut self,
        token: impl Into<Bytes>,
        subject: SubjectId,
        expires: Timestamp,
    ) -> Self {
        let token = token.into();
        self.tokens.insert(token_id(&token), (token, VerifiedCredential { subject, expires }));
        self
    }
}

impl CredentialVerifier for FixedCredentials {
    fn verify(
        &self,
        credential: &Credential,
        message: &Digest,
        _: Timestamp,
    ) -> Result<VerifiedCredential, CredentialError> {
        let rejected = |reason: &str| CredentialError::Rejected { reason: reason.to_string() };

        let (id, proof) = credential
            .as_bytes()
            .split_at_checked(HASH_SIZE)
            .ok_or_else(|| rejected("presentation too short"))?;
        let id = Digest::from_slice(id).map_err(|_| rejected("malformed token id"))?;
        let proof = Digest::from_slice(proof).map_err(|_| rejected("malformed presentation"))?;

        let (token, verified) = self.tokens.get(&id).ok_or_else(|| rejected("unknown token"))?;
        if presentation_proof(token, message) != proof {
            return Err(rejected("presentation is not for this message"));
        }
        Ok(verified.clone())
    }
}

fn token_id(token: &[u8]) -> Digest {
    Digest::of_parts(&[TOKEN_ID_LABEL, token])
}

fn presentation_proof(token: &[u8], message: &Digest) -> Digest {
    Digest::of_parts(&[PRESENTATION_LABEL, token, message.as_bytes()])
}
