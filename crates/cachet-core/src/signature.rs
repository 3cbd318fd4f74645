//! Signature layer.
//!
//! Authenticates the compressed content as coming from a subject, using one
//! of three variants:
//!
//! - **Host**: full-domain signature `H^d mod n` with the host's key active
//!   at the signature time
//! - **Client**: zero-knowledge proof of the secret behind a commitment the
//!   client registered with a host
//! - **Credentials**: opaque tokens presented over the signing digest and
//!   checked by an injected verifier
//!
//! # State
//!
//! A decoded [`Signature`] is unverified. [`Signature::verify`] consumes it
//! and returns a [`VerifiedSignature`]; there is no way back. Only a
//! `VerifiedSignature` exposes the content and an authoritative subject.
//!
//! # Signing digest
//!
//! ```text
//! H( "cachet-signature-v1" || CBOR[variant tag, (subject, time, audit,
//!                                                binding, H(content))] )
//! ```
//!
//! `binding` is the encoded commitment for Client and empty for Host and
//! Credentials, so a proof cannot be replayed under a different commitment.
//! Every variant's proof material is bound to this digest.

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use cachet_crypto::{Digest, PrivateKey, Proof, ProofParams, commitment as zk};
use cachet_proto::{
    HostId, SubjectId, Timestamp,
    wire::{self, Tag},
};
use serde_bytes::ByteBuf;

use crate::{
    commitment::{Commitment, CommitmentFields, SecretCommitment},
    credentials::{Credential, CredentialHolder, CredentialVerifier, VerifiedCredential},
    env::Environment,
    error::{EnvelopeError, Layer},
    keychain::KeyChain,
};

/// Domain separator for signing digests.
pub const SIGNING_DOMAIN: &[u8] = b"cachet-signature-v1";

type Audit = Option<ByteBuf>;
type HostFields = (SubjectId, Timestamp, Audit, ByteBuf, ByteBuf);
type ClientFields =
    (SubjectId, Timestamp, Audit, CommitmentFields, ByteBuf, (bool, ByteBuf), ByteBuf);
type CredentialsFields = (SubjectId, Timestamp, Audit, Vec<ByteBuf>, ByteBuf);

/// Signature variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Host key signature
    Host,
    /// Client commitment proof
    Client,
    /// Credential tokens
    Credentials,
}

impl Variant {
    /// Wire tag of this variant.
    pub const fn tag(self) -> Tag {
        match self {
            Self::Host => Tag::HostSignature,
            Self::Client => Tag::ClientSignature,
            Self::Credentials => Tag::CredentialsSignature,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::Client => "client",
            Self::Credentials => "credentials",
        })
    }
}

/// How the sender authenticates.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Sign as a host with its private key
    Host {
        /// Signing host; also the subject
        host: HostId,
        /// Host's key active at signing time
        key: Arc<PrivateKey>,
    },
    /// Prove knowledge of a registered commitment's secret
    Client {
        /// Claimed subject
        subject: SubjectId,
        /// Commitment with its secret
        commitment: Arc<SecretCommitment>,
    },
    /// Present held credentials
    Credentials {
        /// Claimed subject
        subject: SubjectId,
        /// Holders, in presentation order
        credentials: Vec<Arc<dyn CredentialHolder>>,
    },
}

/// Authentication context for an outgoing envelope.
#[derive(Debug, Clone)]
pub struct AuthContext {
    method: AuthMethod,
    audit: Option<Bytes>,
}

impl AuthContext {
    /// Authenticate as `host` with `key`.
    pub fn host(host: HostId, key: Arc<PrivateKey>) -> Self {
        Self { method: AuthMethod::Host { host, key }, audit: None }
    }

    /// Authenticate as `subject` by proof over `commitment`.
    pub fn client(subject: SubjectId, commitment: Arc<SecretCommitment>) -> Self {
        Self { method: AuthMethod::Client { subject, commitment }, audit: None }
    }

    /// Authenticate as `subject` by presenting `credentials`.
    pub fn credentials(subject: SubjectId, credentials: Vec<Arc<dyn CredentialHolder>>) -> Self {
        Self { method: AuthMethod::Credentials { subject, credentials }, audit: None }
    }

    /// Attach an opaque audit trail.
    #[must_use]
    pub fn with_audit(mut self, audit: impl Into<Bytes>) -> Self {
        self.audit = Some(audit.into());
        self
    }

    /// Authentication method.
    pub fn method(&self) -> &AuthMethod {
        &self.method
    }

    /// Subject the signature will claim.
    pub fn subject(&self) -> SubjectId {
        match &self.method {
            AuthMethod::Host { host, .. } => SubjectId::from(host),
            AuthMethod::Client { subject, .. } | AuthMethod::Credentials { subject, .. } => {
                subject.clone()
            },
        }
    }

    /// Variant this context produces.
    pub fn variant(&self) -> Variant {
        match self.method {
            AuthMethod::Host { .. } => Variant::Host,
            AuthMethod::Client { .. } => Variant::Client,
            AuthMethod::Credentials { .. } => Variant::Credentials,
        }
    }
}

/// Variant-specific proof material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureProof {
    /// Host signature bytes (element-width)
    Host {
        /// `H^d mod n`
        signature: Bytes,
    },
    /// Commitment and zero-knowledge proof
    Client {
        /// Commitment the proof refers to
        commitment: Commitment,
        /// Challenge and response
        proof: Proof,
    },
    /// Credential presentations over the signing digest
    Credentials {
        /// Presentations, in order
        credentials: Vec<Credential>,
    },
}

/// Everything [`Signature::verify`] needs from the receiving side.
#[derive(Clone, Copy)]
pub struct VerifyContext<'a> {
    /// Verification time
    pub now: Timestamp,
    /// Maximum signature age
    pub staleness_window: Duration,
    /// Maximum signature time ahead of `now`
    pub max_clock_skew: Duration,
    /// Proof bound
    pub proof_params: ProofParams,
    /// Host key resolution
    pub keychain: &'a dyn KeyChain,
    /// Credential token verification
    pub credentials: &'a dyn CredentialVerifier,
}

/// Decoded, unverified signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    subject: SubjectId,
    time: Timestamp,
    audit: Option<Bytes>,
    proof: SignatureProof,
    content: Bytes,
}

impl Signature {
    /// Sign `content` at `time`.
    ///
    /// # Errors
    ///
    /// - `Signature` if the host key cannot sign, the proof cannot be
    ///   produced under `params`, or a credential cannot be presented
    /// - `Encoding { layer: Signature }` if the commitment cannot be encoded
    pub fn sign<E: Environment>(
        content: Bytes,
        auth: &AuthContext,
        time: Timestamp,
        params: ProofParams,
        env: &E,
    ) -> Result<Self, EnvelopeError> {
        let subject = auth.subject();
        let audit = auth.audit.clone();

        let proof = match &auth.method {
            AuthMethod::Host { key, .. } => {
                let digest =
                    signing_digest(Variant::Host, &subject, time, audit.as_deref(), &[], &content)?;
                let signature = key.sign_digest(&digest).map_err(EnvelopeError::signature)?;
                SignatureProof::Host { signature: Bytes::from(signature) }
            },
            AuthMethod::Client { commitment, .. } => {
                let binding = commitment.commitment().encode()?;
                let digest = signing_digest(
                    Variant::Client,
                    &subject,
                    time,
                    audit.as_deref(),
                    &binding,
                    &content,
                )?;
                let proof =
                    commitment.prove(&digest, params, env).map_err(EnvelopeError::signature)?;
                SignatureProof::Client { commitment: commitment.commitment().clone(), proof }
            },
            AuthMethod::Credentials { credentials, .. } => {
                let digest = signing_digest(
                    Variant::Credentials,
                    &subject,
                    time,
                    audit.as_deref(),
                    &[],
                    &content,
                )?;
                let credentials = credentials
                    .iter()
                    .map(|holder| holder.present(&digest))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(EnvelopeError::signature)?;
                SignatureProof::Credentials { credentials }
            },
        };

        Ok(Self { subject, time, audit, proof, content })
    }

    /// Variant of this signature.
    pub fn variant(&self) -> Variant {
        match self.proof {
            SignatureProof::Host { .. } => Variant::Host,
            SignatureProof::Client { .. } => Variant::Client,
            SignatureProof::Credentials { .. } => Variant::Credentials,
        }
    }

    /// Claimed subject. Not authoritative until verified.
    pub fn unverified_subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Claimed signing time.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Audit trail, if any.
    pub fn audit(&self) -> Option<&Bytes> {
        self.audit.as_ref()
    }

    /// Variant-specific proof material.
    pub fn proof(&self) -> &SignatureProof {
        &self.proof
    }

    /// Replace the proof material (for tamper tests and re-signing tools).
    #[must_use]
    pub fn with_proof(mut self, proof: SignatureProof) -> Self {
        self.proof = proof;
        self
    }

    /// Encode as a signature tuple.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let subject = self.subject.clone();
        let audit = self.audit.as_ref().map(|a| ByteBuf::from(a.to_vec()));
        let content = ByteBuf::from(self.content.to_vec());

        let encoded = match &self.proof {
            SignatureProof::Host { signature } => {
                let fields: HostFields =
                    (subject, self.time, audit, ByteBuf::from(signature.to_vec()), content);
                wire::encode_tagged(Tag::HostSignature, &fields)
            },
            SignatureProof::Client { commitment, proof } => {
                let fields: ClientFields = (
                    subject,
                    self.time,
                    audit,
                    commitment.to_fields(),
                    ByteBuf::from(proof.challenge().as_bytes().to_vec()),
                    (proof.is_negative(), ByteBuf::from(proof.magnitude_bytes())),
                    content,
                );
                wire::encode_tagged(Tag::ClientSignature, &fields)
            },
            SignatureProof::Credentials { credentials } => {
                let tokens = credentials.iter().map(|c| ByteBuf::from(c.as_bytes().to_vec()));
                let fields: CredentialsFields =
                    (subject, self.time, audit, tokens.collect(), content);
                wire::encode_tagged(Tag::CredentialsSignature, &fields)
            },
        };
        encoded.map_err(malformed)
    }

    /// Decode any signature variant.
    ///
    /// # Errors
    ///
    /// - `Encoding { layer: Signature }` on a malformed tuple, a tag that is
    ///   not a signature variant, or non-canonical proof fields
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let (tag, fields) = wire::decode_any(bytes).map_err(malformed)?;

        match tag {
            Tag::HostSignature => {
                let (subject, time, audit, signature, content): HostFields =
                    wire::deserialize_fields(&fields).map_err(malformed)?;
                let proof = SignatureProof::Host { signature: Bytes::from(signature.into_vec()) };
                Ok(Self::from_parts(subject, time, audit, proof, content))
            },
            Tag::ClientSignature => {
                let fields: ClientFields = wire::deserialize_fields(&fields).map_err(malformed)?;
                let (subject, time, audit, commitment, challenge, (negative, magnitude), content) =
                    fields;
                let commitment = Commitment::from_fields(commitment)?;
                let challenge = Digest::from_slice(&challenge).map_err(malformed)?;
                let proof = Proof::from_parts(challenge, negative, &magnitude).map_err(malformed)?;
                let proof = SignatureProof::Client { commitment, proof };
                Ok(Self::from_parts(subject, time, audit, proof, content))
            },
            Tag::CredentialsSignature => {
                let (subject, time, audit, tokens, content): CredentialsFields =
                    wire::deserialize_fields(&fields).map_err(malformed)?;
                let credentials =
                    tokens.into_iter().map(|t| Credential::new(t.into_vec())).collect();
                let proof = SignatureProof::Credentials { credentials };
                Ok(Self::from_parts(subject, time, audit, proof, content))
            },
            other => Err(malformed(format!("tag {:#06x} is not a signature", other.to_u16()))),
        }
    }

    fn from_parts(
        subject: SubjectId,
        time: Timestamp,
        audit: Audit,
        proof: SignatureProof,
        content: ByteBuf,
    ) -> Self {
        Self {
            subject,
            time,
            audit: audit.map(|a| Bytes::from(a.into_vec())),
            proof,
            content: Bytes::from(content.into_vec()),
        }
    }

    /// Verify the signature, consuming it.
    ///
    /// Freshness is checked first for every variant, then the variant's
    /// proof.
    ///
    /// # Errors
    ///
    /// - `Signature` if the time is stale or too far ahead, a key cannot be
    ///   resolved, the proof fails, or no credential presented over this
    ///   signature's digest authorizes the subject
    /// - `KeyRotation` if a client commitment's key is no longer the host's
    ///   active key at the signature time
    pub fn verify(self, ctx: &VerifyContext<'_>) -> Result<VerifiedSignature, EnvelopeError> {
        let variant = self.variant();
        let result = self.verify_inner(ctx);
        if let Err(err) = &result {
            tracing::warn!(%variant, kind = err.kind(), error = %err, "signature rejected");
        }
        result
    }

    fn verify_inner(self, ctx: &VerifyContext<'_>) -> Result<VerifiedSignature, EnvelopeError> {
        check_freshness(self.time, ctx)?;

        let authority = match &self.proof {
            SignatureProof::Host { signature } => {
                let host = HostId::new(self.subject.as_str());
                let key = ctx.keychain.public_key(&host, self.time).map_err(|e| {
                    EnvelopeError::signature(format!("cannot resolve signing key: {e}"))
                })?;
                let digest = self.digest(Variant::Host, &[])?;
                key.verify_digest(&digest, signature).map_err(EnvelopeError::signature)?;
                Authority::Host { host }
            },
            SignatureProof::Client { commitment, proof } => {
                let committed = commitment.public_key(ctx.keychain)?;
                let active = ctx.keychain.public_key(commitment.host(), self.time).map_err(|e| {
                    EnvelopeError::signature(format!("cannot resolve active host key: {e}"))
                })?;
                if active.fingerprint() != committed.fingerprint() {
                    return Err(EnvelopeError::KeyRotation {
                        host: commitment.host().clone(),
                        committed_at: commitment.time(),
                    });
                }

                let digest = self.digest(Variant::Client, &commitment.encode()?)?;
                zk::verify(&committed, commitment.value(), &digest, proof, ctx.proof_params)
                    .map_err(EnvelopeError::signature)?;
                Authority::Client { commitment: commitment.clone() }
            },
            SignatureProof::Credentials { credentials } => {
                let digest = self.digest(Variant::Credentials, &[])?;
                let accepted: Vec<VerifiedCredential> = credentials
                    .iter()
                    .filter_map(|credential| {
                        ctx.credentials
                            .verify(credential, &digest, ctx.now)
                            .inspect_err(|err| tracing::debug!(error = %err, "credential rejected"))
                            .ok()
                    })
                    .filter(|verified| verified.authorizes(&self.subject, ctx.now))
                    .collect();

                if accepted.is_empty() {
                    return Err(EnvelopeError::signature(format!(
                        "none of {} credentials is valid for {}",
                        credentials.len(),
                        self.subject
                    )));
                }
                Authority::Credentials { credentials: accepted }
            },
        };

        Ok(VerifiedSignature {
            subject: self.subject,
            time: self.time,
            audit: self.audit,
            authority,
            content: self.content,
        })
    }

    fn digest(&self, variant: Variant, binding: &[u8]) -> Result<Digest, EnvelopeError> {
        let audit = self.audit.as_deref();
        signing_digest(variant, &self.subject, self.time, audit, binding, &self.content)
    }
}

/// What verification established about the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authority {
    /// Signed by this host's key
    Host {
        /// Signing host
        host: HostId,
    },
    /// Proved knowledge of this commitment's secret
    Client {
        /// Verified commitment
        commitment: Commitment,
    },
    /// Presented these valid credentials
    Credentials {
        /// Credentials that authorized the subject
        credentials: Vec<VerifiedCredential>,
    },
}

/// Who is acting, for the authorization layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Agent {
    /// A host acting for itself
    Host(HostId),
    /// A client acting through a commitment registered with `host`
    Client {
        /// Authenticated subject
        subject: SubjectId,
        /// Host holding the commitment
        host: HostId,
    },
    /// A subject vouched for by credentials
    Credentials {
        /// Authenticated subject
        subject: SubjectId,
    },
}

/// Signature whose proof has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    subject: SubjectId,
    time: Timestamp,
    audit: Option<Bytes>,
    authority: Authority,
    content: Bytes,
}

impl VerifiedSignature {
    /// Authenticated subject.
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Signing time.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Audit trail, if any.
    pub fn audit(&self) -> Option<&Bytes> {
        self.audit.as_ref()
    }

    /// Variant that was verified.
    pub fn variant(&self) -> Variant {
        match self.authority {
            Authority::Host { .. } => Variant::Host,
            Authority::Client { .. } => Variant::Client,
            Authority::Credentials { .. } => Variant::Credentials,
        }
    }

    /// What verification established.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Agent acting, derived per variant.
    pub fn agent(&self) -> Agent {
        match &self.authority {
            Authority::Host { host } => Agent::Host(host.clone()),
            Authority::Client { commitment } => Agent::Client {
                subject: self.subject.clone(),
                host: commitment.host().clone(),
            },
            Authority::Credentials { .. } => Agent::Credentials { subject: self.subject.clone() },
        }
    }

    /// Signed content (the compression tuple).
    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

fn signing_digest(
    variant: Variant,
    subject: &SubjectId,
    time: Timestamp,
    audit: Option<&[u8]>,
    binding: &[u8],
    content: &[u8],
) -> Result<Digest, EnvelopeError> {
    let content_hash = Digest::of(content);
    let fields = (
        subject,
        time,
        audit.map(serde_bytes::Bytes::new),
        serde_bytes::Bytes::new(binding),
        serde_bytes::Bytes::new(content_hash.as_bytes()),
    );
    let encoded = wire::encode_tagged(variant.tag(), &fields).map_err(malformed)?;
    Ok(Digest::of_parts(&[SIGNING_DOMAIN, &encoded]))
}

fn check_freshness(time: Timestamp, ctx: &VerifyContext<'_>) -> Result<(), EnvelopeError> {
    match time.elapsed_until(ctx.now) {
        Some(age) if age > ctx.staleness_window => Err(EnvelopeError::signature(format!(
            "signature is stale: signed at {time}, {}s old (window {}s)",
            age.as_secs(),
            ctx.staleness_window.as_secs()
        ))),
        Some(_) => Ok(()),
        None => {
            let ahead = ctx.now.elapsed_until(time).unwrap_or_default();
            if ahead > ctx.max_clock_skew {
                return Err(EnvelopeError::signature(format!(
                    "signature time {time} is {}s ahead of local clock",
                    ahead.as_secs()
                )));
            }
            Ok(())
        },
    }
}

fn malformed(reason: impl fmt::Display) -> EnvelopeError {
    EnvelopeError::encoding(Layer::Signature, reason)
}
