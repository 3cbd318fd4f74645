//! Client commitments registered with a host.
//!
//! A [`Commitment`] is the public triple `(host, time, value)` with
//! `value = g^x` in the group of the host key active at `time`. The key is
//! referenced by `(host, time)` and resolved through the key chain, so a
//! commitment can be decoded without one.
//!
//! A [`SecretCommitment`] adds the exponent `x`. It exists only on the client
//! that created it, is never serialized, and its `Debug` output is redacted.

use std::{fmt, sync::Arc};

use cachet_crypto::{
    BigUint, CryptoError, Digest, Proof, ProofParams, PublicKey, Secret, commitment,
};
use cachet_proto::{
    HostId, Timestamp,
    wire::{self, Tag},
};
use serde_bytes::ByteBuf;
use zeroize::Zeroize;

use crate::{
    env::Environment,
    error::{EnvelopeError, Layer},
    keychain::KeyChain,
};

/// Nested wire form: `(host, time, value)`.
pub(crate) type CommitmentFields = (HostId, Timestamp, ByteBuf);

/// Public commitment. Equality is the triple `(host, time, value)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Commitment {
    host: HostId,
    time: Timestamp,
    value: BigUint,
}

impl Commitment {
    /// Assemble a commitment.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidGroupElement` if `value` is zero
    pub fn new(host: HostId, time: Timestamp, value: BigUint) -> Result<Self, CryptoError> {
        if value == BigUint::default() {
            return Err(CryptoError::InvalidGroupElement);
        }
        Ok(Self { host, time, value })
    }

    /// Host the commitment is registered with.
    pub fn host(&self) -> &HostId {
        &self.host
    }

    /// When the commitment was made; selects the host key.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Committed group element `g^x`.
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Resolve the host key this commitment lives under.
    pub fn public_key(&self, keychain: &dyn KeyChain) -> Result<Arc<PublicKey>, EnvelopeError> {
        keychain.public_key(&self.host, self.time).map_err(|e| {
            EnvelopeError::signature(format!("cannot resolve commitment key: {e}"))
        })
    }

    /// Encode standalone, for registration with a host.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        wire::encode_tagged(Tag::Commitment, &self.to_fields())
            .map_err(|e| EnvelopeError::encoding(Layer::Signature, e))
    }

    /// Decode a standalone commitment.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let fields: CommitmentFields = wire::decode_tagged(Tag::Commitment, bytes)
            .map_err(|e| EnvelopeError::encoding(Layer::Signature, e))?;
        Self::from_fields(fields)
    }

    pub(crate) fn to_fields(&self) -> CommitmentFields {
        (self.host.clone(), self.time, ByteBuf::from(self.value.to_bytes_be()))
    }

    /// Parse nested fields. The value must be minimal big-endian and
    /// non-zero.
    pub(crate) fn from_fields(
        (host, time, value): CommitmentFields,
    ) -> Result<Self, EnvelopeError> {
        if value.is_empty() || value[0] == 0 {
            return Err(EnvelopeError::encoding(
                Layer::Signature,
                "commitment value is not minimally encoded",
            ));
        }
        Self::new(host, time, BigUint::from_bytes_be(&value))
            .map_err(|e| EnvelopeError::encoding(Layer::Signature, e))
    }
}

/// Client-side commitment carrying its secret exponent.
pub struct SecretCommitment {
    commitment: Commitment,
    public_key: Arc<PublicKey>,
    secret: Secret,
}

impl SecretCommitment {
    /// Draw a fresh secret and commit to it under `public_key`, the key
    /// `host` has active at `time`.
    pub fn create<E: Environment>(
        host: HostId,
        time: Timestamp,
        public_key: Arc<PublicKey>,
        env: &E,
    ) -> Result<Self, CryptoError> {
        let mut random = vec![0u8; public_key.element_len()];
        env.random_bytes(&mut random);
        let secret = Secret::from_random(&public_key, &random);
        random.zeroize();

        Self::from_secret(host, time, public_key, secret?)
    }

    /// Commit to an existing secret.
    pub fn from_secret(
        host: HostId,
        time: Timestamp,
        public_key: Arc<PublicKey>,
        secret: Secret,
    ) -> Result<Self, CryptoError> {
        let value = commitment::commit(&public_key, &secret);
        let commitment = Commitment::new(host, time, value)?;
        Ok(Self { commitment, public_key, secret })
    }

    /// Public part.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// Host key the commitment was made under.
    pub fn public_key(&self) -> &Arc<PublicKey> {
        &self.public_key
    }

    /// Prove knowledge of the secret, bound to `message`.
    pub fn prove<E: Environment>(
        &self,
        message: &Digest,
        params: ProofParams,
        env: &E,
    ) -> Result<Proof, CryptoError> {
        let mut nonce = vec![0u8; params.nonce_len()];
        env.random_bytes(&mut nonce);
        let proof = commitment::prove(&self.public_key, &self.secret, message, params, &nonce);
        nonce.zeroize();
        proof
    }
}

impl PartialEq for SecretCommitment {
    fn eq(&self, other: &Self) -> bool {
        self.commitment == other.commitment
    }
}

impl Eq for SecretCommitment {}

impl fmt::Debug for SecretCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCommitment")
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use cachet_crypto::test_utils;

    use super::*;
    use crate::test_utils::MockEnv;

    fn public_key() -> Arc<PublicKey> {
        Arc::new(test_utils::host_key(0).public_key().clone())
    }

    #[test]
    fn created_commitment_is_in_group() {
        let env = MockEnv::with_seed(1);
        let secret = SecretCommitment::create(
            HostId::new("host.example"),
            Timestamp::from_secs(1000),
            public_key(),
            &env,
        )
        .unwrap();

        assert!(secret.public_key().contains(secret.commitment().value()));
    }

    #[test]
    fn standalone_encoding_round_trips() {
        let env = MockEnv::with_seed(2);
        let secret = SecretCommitment::create(
            HostId::new("host.example"),
            Timestamp::from_secs(1000),
            public_key(),
            &env,
        )
        .unwrap();

        let encoded = secret.commitment().encode().unwrap();
        assert_eq!(&Commitment::decode(&encoded).unwrap(), secret.commitment());
    }

    #[test]
    fn non_minimal_value_rejected() {
        let fields = (HostId::new("h"), Timestamp::EPOCH, ByteBuf::from(vec![0u8, 5]));
        assert!(matches!(
            Commitment::from_fields(fields),
            Err(EnvelopeError::Encoding { layer: Layer::Signature, .. })
        ));

        let fields = (HostId::new("h"), Timestamp::EPOCH, ByteBuf::new());
        assert!(Commitment::from_fields(fields).is_err());
    }

    #[test]
    fn proof_bound_below_modulus_is_refused() {
        let env = MockEnv::with_seed(3);
        let secret = SecretCommitment::create(
            HostId::new("host.example"),
            Timestamp::from_secs(1000),
            public_key(),
            &env,
        )
        .unwrap();

        // 1024-bit modulus needs B >= 1024 + 256 + 128
        let tight = ProofParams::new(1024).unwrap();
        assert!(matches!(
            secret.prove(&Digest::of(b"m"), tight, &env),
            Err(CryptoError::ProofBoundTooSmall { bound: 1024, .. })
        ));
        assert!(secret.prove(&Digest::of(b"m"), ProofParams::new(1408).unwrap(), &env).is_ok());
    }

    #[test]
    fn equality_ignores_secret() {
        let a = SecretCommitment::from_secret(
            HostId::new("h"),
            Timestamp::EPOCH,
            public_key(),
            Secret::from_biguint(BigUint::from(42u32)).unwrap(),
        )
        .unwrap();
        let b = SecretCommitment::from_secret(
            HostId::new("h"),
            Timestamp::EPOCH,
            public_key(),
            Secret::from_biguint(BigUint::from(42u32)).unwrap(),
        )
        .unwrap();

        assert_eq!(a, b);
        assert!(!format!("{a:?}").contains("secret"));
    }
}
