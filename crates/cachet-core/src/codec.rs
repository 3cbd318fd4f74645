//! Envelope codec: composes the three layers.
//!
//! ```text
//! encode: Payload -> Compression -> Signature -> Encryption -> frame
//! decode: frame -> Encryption -> Signature -> verify -> Compression -> Payload
//! ```
//!
//! Decoding is split in two phases so a receiver can route on the outer
//! metadata before paying for verification:
//!
//! 1. [`EnvelopeCodec::open`] strips the frame and the Encryption layer and
//!    yields an unverified [`Signature`] plus the session key.
//! 2. [`EnvelopeCodec::verify`] and [`EnvelopeCodec::unpack`] check the
//!    signature and recover the payload.
//!
//! [`EnvelopeCodec::decode`] runs both phases.
//!
//! The codec does no cryptography of its own. Inner-layer errors propagate
//! unchanged.

use std::sync::Arc;

use bytes::Bytes;
use cachet_crypto::{KeyCache, ProofParams, SymmetricKey};
use cachet_proto::{HostId, Payload, Timestamp, frame};

use crate::{
    compression,
    config::{CodecConfig, ConfigError},
    credentials::{CredentialVerifier, RejectAllCredentials},
    encryption::{self, CryptoContext, DecryptionContext, Encryption},
    env::Environment,
    error::{EnvelopeError, Layer},
    keychain::KeyChain,
    signature::{AuthContext, Signature, VerifiedSignature, VerifyContext},
};

/// Envelope after the Encryption layer has been removed.
#[derive(Debug, Clone)]
pub struct OpenedEnvelope {
    /// Envelope time
    pub time: Timestamp,
    /// Addressed host, `None` for replies
    pub recipient: Option<HostId>,
    /// Session key; a host replies under it
    pub session_key: Option<SymmetricKey>,
    /// Unverified signature
    pub signature: Signature,
}

/// Fully decoded and verified envelope.
#[derive(Debug, Clone)]
pub struct DecodedEnvelope {
    /// Application payload
    pub payload: Payload,
    /// Verified signature metadata
    pub signature: VerifiedSignature,
    /// Session key; a host replies under it
    pub session_key: Option<SymmetricKey>,
}

/// Encodes and decodes envelopes.
///
/// Cheap to share: collaborators are held behind `Arc`, and the key cache
/// may be shared between codecs with [`EnvelopeCodec::with_key_cache`].
pub struct EnvelopeCodec<E: Environment> {
    env: E,
    config: CodecConfig,
    proof_params: ProofParams,
    keychain: Arc<dyn KeyChain>,
    key_cache: Arc<KeyCache>,
    credentials: Arc<dyn CredentialVerifier>,
}

impl<E: Environment> EnvelopeCodec<E> {
    /// Create a codec with its own key cache and no credential verifier.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if `config` does not validate
    pub fn new(
        env: E,
        config: CodecConfig,
        keychain: Arc<dyn KeyChain>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let proof_params = config.proof_params()?;
        let key_cache = Arc::new(KeyCache::new(config.cache_capacity()?));

        Ok(Self {
            env,
            config,
            proof_params,
            keychain,
            key_cache,
            credentials: Arc::new(RejectAllCredentials),
        })
    }

    /// Use a shared key cache.
    #[must_use]
    pub fn with_key_cache(mut self, key_cache: Arc<KeyCache>) -> Self {
        self.key_cache = key_cache;
        self
    }

    /// Use `verifier` for credentials signatures.
    #[must_use]
    pub fn with_credential_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.credentials = verifier;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Key cache in use.
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.key_cache
    }

    /// Draw a fresh session key for a request.
    pub fn generate_key(&self) -> SymmetricKey {
        encryption::session_key(&self.env)
    }

    /// Seal `payload` into an envelope.
    ///
    /// # Errors
    ///
    /// - `Encoding` if a layer cannot be encoded or the payload is too large
    /// - `Signature` if the signer cannot produce its proof
    /// - `Encryption` if the recipient's key cannot be resolved
    pub fn encode(
        &self,
        payload: &Payload,
        auth: &AuthContext,
        crypto: &CryptoContext,
    ) -> Result<Vec<u8>, EnvelopeError> {
        let time = self.env.now();

        let compressed = compression::wrap(
            payload,
            self.config.compression_level(),
            self.config.max_payload_size,
        )?;
        let signature =
            Signature::sign(Bytes::from(compressed), auth, time, self.proof_params, &self.env)?;
        let encryption = Encryption::wrap(
            Bytes::from(signature.encode()?),
            crypto,
            time,
            self.keychain.as_ref(),
            &self.key_cache,
            &self.env,
        )?;

        let body = encryption.encode()?;
        let mut envelope = Vec::with_capacity(frame::PREFIX_SIZE + body.len());
        frame::encode(&body, &mut envelope)
            .map_err(|e| EnvelopeError::encoding(Layer::Encryption, e))?;

        tracing::debug!(
            subject = %auth.subject(),
            variant = %auth.variant(),
            recipient = ?crypto.recipient(),
            encrypted = encryption.is_encrypted(),
            size = envelope.len(),
            "sealed envelope"
        );
        Ok(envelope)
    }

    /// Remove the frame and Encryption layer.
    ///
    /// # Errors
    ///
    /// - `Encoding { layer: Encryption }` on a bad frame or tuple, or an
    ///   envelope addressed to a host not run here
    /// - `Encryption` if no key is available or the content fails to
    ///   authenticate
    /// - `Encoding { layer: Signature }` if the content is not a signature
    pub fn open(
        &self,
        bytes: &[u8],
        ctx: &DecryptionContext,
    ) -> Result<OpenedEnvelope, EnvelopeError> {
        let body = frame::decode(bytes).map_err(|e| EnvelopeError::encoding(Layer::Encryption, e))?;
        let encryption = Encryption::decode(body)?;
        let (content, session_key) =
            encryption.unwrap(ctx, self.keychain.as_ref(), &self.key_cache)?;
        let signature = Signature::decode(&content)?;

        tracing::debug!(
            recipient = ?encryption.recipient(),
            subject = %signature.unverified_subject(),
            variant = %signature.variant(),
            size = bytes.len(),
            "opened envelope"
        );
        Ok(OpenedEnvelope {
            time: encryption.time(),
            recipient: encryption.recipient().cloned(),
            session_key,
            signature,
        })
    }

    /// Verify a signature at the current time.
    ///
    /// # Errors
    ///
    /// - `Signature` or `KeyRotation`, see [`Signature::verify`]
    pub fn verify(&self, signature: Signature) -> Result<VerifiedSignature, EnvelopeError> {
        signature.verify(&VerifyContext {
            now: self.env.now(),
            staleness_window: self.config.staleness_window,
            max_clock_skew: self.config.max_clock_skew,
            proof_params: self.proof_params,
            keychain: self.keychain.as_ref(),
            credentials: self.credentials.as_ref(),
        })
    }

    /// Recover the payload from verified content.
    ///
    /// # Errors
    ///
    /// - `Encoding { layer: Compression | Payload }` on malformed content
    pub fn unpack(&self, signature: &VerifiedSignature) -> Result<Payload, EnvelopeError> {
        compression::unwrap(signature.content(), self.config.max_payload_size)
    }

    /// Open, verify and unpack an envelope.
    ///
    /// # Errors
    ///
    /// Any error of [`Self::open`], [`Self::verify`] or [`Self::unpack`].
    pub fn decode(
        &self,
        bytes: &[u8],
        ctx: &DecryptionContext,
    ) -> Result<DecodedEnvelope, EnvelopeError> {
        let opened = self.open(bytes, ctx)?;
        let signature = self.verify(opened.signature)?;
        let payload = self.unpack(&signature)?;

        Ok(DecodedEnvelope { payload, signature, session_key: opened.session_key })
    }

    /// Seal a structured reply for `error`, signed with `auth`.
    ///
    /// Returns `None` if the error leaves nothing to answer (the outer
    /// Encryption layer failed). The reply is encrypted under
    /// `session_key` when one was recovered from the request.
    ///
    /// # Errors
    ///
    /// Any error of [`Self::encode`].
    pub fn reply_with_error(
        &self,
        error: &EnvelopeError,
        auth: &AuthContext,
        session_key: Option<&SymmetricKey>,
    ) -> Result<Option<Vec<u8>>, EnvelopeError> {
        let Some(reply) = error.reply() else {
            tracing::debug!(kind = error.kind(), "no reply possible, aborting exchange");
            return Ok(None);
        };

        let payload = reply.into_payload().map_err(|e| EnvelopeError::encoding(Layer::Payload, e))?;
        let crypto = session_key
            .map_or_else(CryptoContext::plaintext, |key| CryptoContext::reply(key.clone()));
        self.encode(&payload, auth, &crypto).map(Some)
    }
}
