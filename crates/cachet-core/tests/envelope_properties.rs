//! End-to-end properties of the envelope codec.
//!
//! A client and a host each run their own codec over their own key chain:
//! the client only knows the host's public keys, the host holds the private
//! keys. Both share one virtual clock.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use cachet_core::{
    AuthContext, CodecConfig, CryptoContext, Credential, CredentialError, CredentialHolder,
    DecryptionContext, EnvelopeCodec, EnvelopeError, Environment, Layer, MemoryKeyChain,
    SecretCommitment, SignatureProof, Variant,
    encryption::Encryption,
    keychain::KeyChain,
    test_utils::{FixedCredentials, FixedToken, MOCK_START, MockEnv},
};
use cachet_crypto::{Digest, KeyCache, Proof, test_utils as keys};
use cachet_proto::{
    ErrorPayload, HostId, Payload, PayloadTag, SubjectId, Timestamp, frame,
    wire::{self, Tag},
};
use proptest::prelude::*;
use serde_bytes::ByteBuf;

type EncryptionFields =
    (Timestamp, Option<HostId>, Option<ByteBuf>, Option<ByteBuf>, Option<ByteBuf>);

fn host() -> HostId {
    HostId::new("id.example.org")
}

fn alice() -> SubjectId {
    SubjectId::new("alice@id.example.org")
}

struct World {
    env: MockEnv,
    client: EnvelopeCodec<MockEnv>,
    host: EnvelopeCodec<MockEnv>,
    client_chain: Arc<MemoryKeyChain>,
    host_chain: Arc<MemoryKeyChain>,
}

impl World {
    fn new(seed: u64) -> Self {
        let env = MockEnv::with_seed(seed);

        let client_chain = Arc::new(MemoryKeyChain::new());
        client_chain.publish(host(), Timestamp::EPOCH, keys::host_key(0).public_key().clone());
        let host_chain = Arc::new(MemoryKeyChain::new());
        host_chain.host_locally(host(), Timestamp::EPOCH, keys::host_key(0));

        let verifier = FixedCredentials::new().accept(
            &b"alice-credential"[..],
            alice(),
            MOCK_START.saturating_add(Duration::from_secs(86_400)),
        );

        let client =
            EnvelopeCodec::new(env.clone(), CodecConfig::default(), client_chain.clone()).unwrap();
        let host = EnvelopeCodec::new(env.clone(), CodecConfig::default(), host_chain.clone())
            .unwrap()
            .with_credential_verifier(Arc::new(verifier));

        Self { env, client, host, client_chain, host_chain }
    }

    fn rotate(&self, at: Timestamp, index: usize) {
        self.client_chain.publish(host(), at, keys::host_key(index).public_key().clone());
        self.host_chain.host_locally(host(), at, keys::host_key(index));
    }

    fn commitment(&self) -> Arc<SecretCommitment> {
        let now = self.env.now();
        let key = self.client_chain.public_key(&host(), now).unwrap();
        Arc::new(SecretCommitment::create(host(), now, key, &self.env).unwrap())
    }

    fn auth(&self, variant: Variant) -> AuthContext {
        match variant {
            Variant::Host => AuthContext::host(host(), Arc::new(keys::host_key(0))),
            Variant::Client => AuthContext::client(alice(), self.commitment()),
            Variant::Credentials => AuthContext::credentials(
                alice(),
                vec![
                    FixedToken::shared(&b"stolen"[..]),
                    FixedToken::shared(&b"alice-credential"[..]),
                ],
            ),
        }
    }
}

/// Presents bytes seen on the wire, without holding the credential.
#[derive(Debug)]
struct Replayed(Credential);

impl CredentialHolder for Replayed {
    fn present(&self, _: &Digest) -> Result<Credential, CredentialError> {
        Ok(self.0.clone())
    }
}

/// Rewrite the outer Encryption tuple of a framed envelope.
fn rewrite_outer(envelope: &[u8], edit: impl FnOnce(&mut EncryptionFields)) -> Vec<u8> {
    let body = frame::decode(envelope).unwrap();
    let mut fields: EncryptionFields = wire::decode_tagged(Tag::Encryption, body).unwrap();
    edit(&mut fields);

    let body = wire::encode_tagged(Tag::Encryption, &fields).unwrap();
    let mut rewritten = Vec::new();
    frame::encode(&body, &mut rewritten).unwrap();
    rewritten
}

fn variant() -> impl Strategy<Value = Variant> {
    prop_oneof![Just(Variant::Host), Just(Variant::Client), Just(Variant::Credentials)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_request_round_trip(
        tag in any::<u16>(),
        body in prop::collection::vec(any::<u8>(), 0..2048),
        variant in variant(),
        seed in any::<u64>(),
    ) {
        let world = World::new(seed);
        let payload = Payload::new(PayloadTag(tag), body);
        let auth = world.auth(variant);
        let key = world.client.generate_key();

        let envelope = world
            .client
            .encode(&payload, &auth, &CryptoContext::request(host(), key.clone()))
            .unwrap();
        let decoded = world.host.decode(&envelope, &DecryptionContext::host()).unwrap();

        prop_assert_eq!(decoded.payload, payload);
        prop_assert_eq!(decoded.signature.subject(), &auth.subject());
        prop_assert_eq!(decoded.signature.variant(), variant);
        prop_assert_eq!(decoded.session_key, Some(key));
    }

    #[test]
    fn prop_ciphertext_bit_flip_detected(
        offset in 0usize..32,
        bit in 0u8..8,
        seed in any::<u64>(),
    ) {
        let world = World::new(seed);
        let payload = Payload::new(PayloadTag(1), &b"transfer"[..]);
        let mut envelope = world
            .client
            .encode(
                &payload,
                &world.auth(Variant::Host),
                &CryptoContext::request(host(), world.client.generate_key()),
            )
            .unwrap();

        // Ciphertext is the last field, so the tail of the envelope is ciphertext
        let index = envelope.len() - 1 - offset;
        envelope[index] ^= 1 << bit;

        let result = world.host.decode(&envelope, &DecryptionContext::host());
        prop_assert!(
            matches!(result, Err(EnvelopeError::Encryption { .. })),
            "expected an encryption error"
        );
    }

    #[test]
    fn prop_proof_bit_flip_detected(
        flip_challenge in any::<bool>(),
        byte in 1usize..32,
        bit in 0u8..8,
        seed in any::<u64>(),
    ) {
        let world = World::new(seed);
        let payload = Payload::new(PayloadTag(1), &b"login"[..]);
        let envelope = world
            .client
            .encode(&payload, &world.auth(Variant::Client), &CryptoContext::plaintext())
            .unwrap();

        let opened = world.host.open(&envelope, &DecryptionContext::host()).unwrap();
        let SignatureProof::Client { commitment, proof } = opened.signature.proof().clone() else {
            unreachable!("client auth produces a client proof");
        };

        let mut challenge = *proof.challenge().as_bytes();
        let mut magnitude = proof.magnitude_bytes();
        if flip_challenge {
            challenge[byte] ^= 1 << bit;
        } else {
            // Byte 0 is never touched, so the magnitude stays minimal
            magnitude[byte] ^= 1 << bit;
        }

        let tampered =
            Proof::from_parts(Digest::from_bytes(challenge), proof.is_negative(), &magnitude)
                .unwrap();
        let forged = opened
            .signature
            .with_proof(SignatureProof::Client { commitment, proof: tampered });

        prop_assert!(
            matches!(world.host.verify(forged), Err(EnvelopeError::Signature { .. })),
            "expected a signature error"
        );
    }

    #[test]
    fn prop_host_signature_bit_flip_detected(
        byte in 0usize..128,
        bit in 0u8..8,
        seed in any::<u64>(),
    ) {
        let world = World::new(seed);
        let payload = Payload::new(PayloadTag(1), &b"announce"[..]);
        let envelope = world
            .client
            .encode(&payload, &world.auth(Variant::Host), &CryptoContext::plaintext())
            .unwrap();

        let opened = world.host.open(&envelope, &DecryptionContext::host()).unwrap();
        let SignatureProof::Host { signature } = opened.signature.proof().clone() else {
            unreachable!("host auth produces a host signature");
        };

        let mut flipped = signature.to_vec();
        flipped[byte % signature.len()] ^= 1 << bit;
        let forged =
            opened.signature.with_proof(SignatureProof::Host { signature: Bytes::from(flipped) });

        prop_assert!(
            matches!(world.host.verify(forged), Err(EnvelopeError::Signature { .. })),
            "expected a signature error"
        );
    }
}

#[test]
fn hybrid_encryption_for_all_content_sizes() {
    let world = World::new(1);
    let cache = KeyCache::new(std::num::NonZeroUsize::new(8).unwrap());

    for len in [0usize, 1, 64, 5000] {
        let content = Bytes::from(vec![0xA5; len]);
        let key = world.client.generate_key();
        let sealed = Encryption::wrap(
            content.clone(),
            &CryptoContext::request(host(), key.clone()),
            world.env.now(),
            world.client_chain.as_ref(),
            &cache,
            &world.env,
        )
        .unwrap();

        let (opened, session) = sealed
            .unwrap(&DecryptionContext::host(), world.host_chain.as_ref(), &cache)
            .unwrap();
        assert_eq!(opened, content, "content of length {len}");
        assert_eq!(session, Some(key));
    }
}

#[test]
fn reply_travels_under_request_key() {
    let world = World::new(2);
    let key = world.client.generate_key();
    let request = world
        .client
        .encode(
            &Payload::new(PayloadTag(1), &b"ping"[..]),
            &world.auth(Variant::Client),
            &CryptoContext::request(host(), key.clone()),
        )
        .unwrap();

    let received = world.host.decode(&request, &DecryptionContext::host()).unwrap();
    let reply = world
        .host
        .encode(
            &Payload::new(PayloadTag(2), &b"pong"[..]),
            &world.auth(Variant::Host),
            &CryptoContext::reply(received.session_key.unwrap()),
        )
        .unwrap();

    let answer = world.client.decode(&reply, &DecryptionContext::reply(key)).unwrap();
    assert_eq!(answer.payload.body().as_ref(), b"pong");
    assert_eq!(answer.signature.subject(), &SubjectId::from(&host()));

    let missing_key = world.client.decode(&reply, &DecryptionContext::host());
    assert!(matches!(missing_key, Err(EnvelopeError::Encryption { .. })));
}

#[test]
fn stale_client_signature_rejected() {
    let world = World::new(3);
    let envelope = world
        .client
        .encode(
            &Payload::new(PayloadTag(1), &b"old"[..]),
            &world.auth(Variant::Client),
            &CryptoContext::request(host(), world.client.generate_key()),
        )
        .unwrap();

    world.env.advance(world.host.config().staleness_window + Duration::from_secs(1));

    let result = world.host.decode(&envelope, &DecryptionContext::host());
    assert!(matches!(result, Err(EnvelopeError::Signature { .. })));
}

#[test]
fn envelope_for_other_host_is_encoding_error() {
    let world = World::new(4);
    let other = HostId::new("other.example.org");
    let other_key = keys::host_key(1).public_key().clone();
    world.client_chain.publish(other.clone(), Timestamp::EPOCH, other_key.clone());
    world.host_chain.publish(other.clone(), Timestamp::EPOCH, other_key);

    let envelope = world
        .client
        .encode(
            &Payload::new(PayloadTag(1), &b"misrouted"[..]),
            &world.auth(Variant::Host),
            &CryptoContext::request(other, world.client.generate_key()),
        )
        .unwrap();

    let err = world.host.decode(&envelope, &DecryptionContext::host()).unwrap_err();
    assert!(matches!(err, EnvelopeError::Encoding { layer: Layer::Encryption, .. }));
    assert_eq!(err.reply(), None);
}

#[test]
fn rotated_host_key_signals_key_rotation() {
    let world = World::new(5);
    let auth = world.auth(Variant::Client);
    let committed_at = world.env.now();

    world.env.advance(Duration::from_secs(60));
    world.rotate(world.env.now(), 1);
    world.env.advance(Duration::from_secs(60));

    let envelope = world
        .client
        .encode(
            &Payload::new(PayloadTag(1), &b"after rotation"[..]),
            &auth,
            &CryptoContext::request(host(), world.client.generate_key()),
        )
        .unwrap();

    let opened = world.host.open(&envelope, &DecryptionContext::host()).unwrap();
    let err = world.host.verify(opened.signature).unwrap_err();
    assert_eq!(err, EnvelopeError::KeyRotation { host: host(), committed_at });

    // The host answers under the request's session key, signing with its new key
    let session = opened.session_key.unwrap();
    let host_auth = AuthContext::host(host(), Arc::new(keys::host_key(1)));
    let reply = world
        .host
        .reply_with_error(&err, &host_auth, Some(&session))
        .unwrap()
        .unwrap();
    let answer = world.client.decode(&reply, &DecryptionContext::reply(session)).unwrap();
    let error = ErrorPayload::from_payload(&answer.payload).unwrap().unwrap();
    assert_eq!(error.code, ErrorPayload::KEY_ROTATION_ERROR);
}

#[test]
fn unverified_credentials_rejected() {
    let world = World::new(6);
    let auth = AuthContext::credentials(alice(), vec![FixedToken::shared(&b"forged"[..])]);
    let envelope = world
        .client
        .encode(&Payload::new(PayloadTag(1), &b"hi"[..]), &auth, &CryptoContext::plaintext())
        .unwrap();

    let result = world.host.decode(&envelope, &DecryptionContext::host());
    assert!(matches!(result, Err(EnvelopeError::Signature { .. })));
}

#[test]
fn key_cache_is_reused_across_envelopes() {
    let world = World::new(7);
    let key = world.client.generate_key();
    let payload = Payload::new(PayloadTag(1), &b"again"[..]);

    for _ in 0..3 {
        let envelope = world
            .client
            .encode(
                &payload,
                &world.auth(Variant::Host),
                &CryptoContext::request(host(), key.clone()),
            )
            .unwrap();
        world.host.decode(&envelope, &DecryptionContext::host()).unwrap();
    }

    let client = world.client.key_cache().stats();
    assert_eq!((client.hits, client.misses, client.encrypt_entries), (2, 1, 1));
    let host = world.host.key_cache().stats();
    assert_eq!((host.hits, host.misses, host.decrypt_entries), (2, 1, 1));
}

#[test]
fn lifted_credentials_do_not_authorize_new_content() {
    let world = World::new(8);
    let genuine = world
        .client
        .encode(
            &Payload::new(PayloadTag(1), &b"read profile"[..]),
            &world.auth(Variant::Credentials),
            &CryptoContext::plaintext(),
        )
        .unwrap();

    // An observer lifts the presentations from the plaintext envelope
    let opened = world.host.open(&genuine, &DecryptionContext::host()).unwrap();
    let SignatureProof::Credentials { credentials } = opened.signature.proof().clone() else {
        unreachable!("credentials auth produces credential presentations");
    };
    let received = world.host.decode(&genuine, &DecryptionContext::host()).unwrap();
    assert_eq!(received.payload.body().as_ref(), b"read profile");

    let observer = EnvelopeCodec::new(
        MockEnv::with_seed(99),
        CodecConfig::default(),
        world.client_chain.clone(),
    )
    .unwrap();
    let replayed: Vec<Arc<dyn CredentialHolder>> = credentials
        .into_iter()
        .map(|credential| Arc::new(Replayed(credential)) as Arc<dyn CredentialHolder>)
        .collect();
    world.env.advance(Duration::from_secs(3600));

    let forged = observer
        .encode(
            &Payload::new(PayloadTag(1), &b"delete account"[..]),
            &AuthContext::credentials(alice(), replayed),
            &CryptoContext::plaintext(),
        )
        .unwrap();

    let result = world.host.decode(&forged, &DecryptionContext::host());
    assert!(matches!(result, Err(EnvelopeError::Signature { .. })));
}

#[test]
fn retimed_envelope_fails_to_authenticate() {
    let world = World::new(9);
    let envelope = world
        .client
        .encode(
            &Payload::new(PayloadTag(1), &b"on time"[..]),
            &world.auth(Variant::Host),
            &CryptoContext::request(host(), world.client.generate_key()),
        )
        .unwrap();

    // Still within the same key period
    let retimed = rewrite_outer(&envelope, |fields| {
        fields.0 = fields.0.saturating_add(Duration::from_secs(30));
    });

    let result = world.host.decode(&retimed, &DecryptionContext::host());
    assert!(matches!(result, Err(EnvelopeError::Encryption { .. })));
    assert!(world.host.decode(&envelope, &DecryptionContext::host()).is_ok());
}

#[test]
fn readdressed_envelope_fails_to_authenticate() {
    let world = World::new(10);
    // A second name this host answers to, under the same key
    let alias = HostId::new("alias.example.org");
    world.host_chain.host_locally(alias.clone(), Timestamp::EPOCH, keys::host_key(0));

    let envelope = world
        .client
        .encode(
            &Payload::new(PayloadTag(1), &b"for id"[..]),
            &world.auth(Variant::Host),
            &CryptoContext::request(host(), world.client.generate_key()),
        )
        .unwrap();

    let readdressed = rewrite_outer(&envelope, |fields| fields.1 = Some(alias));

    let result = world.host.decode(&readdressed, &DecryptionContext::host());
    assert!(matches!(result, Err(EnvelopeError::Encryption { .. })));
}

#[test]
fn proof_bound_below_modulus_refuses_client_signatures() {
    let world = World::new(11);
    let tight = CodecConfig { proof_exponent_bits: 1024, ..CodecConfig::default() };
    assert!(tight.check_modulus_bits(keys::host_key(0).public_key().modulus_bits()).is_err());

    let client = EnvelopeCodec::new(world.env.clone(), tight, world.client_chain.clone()).unwrap();
    let result = client.encode(
        &Payload::new(PayloadTag(1), &b"login"[..]),
        &world.auth(Variant::Client),
        &CryptoContext::plaintext(),
    );
    assert!(matches!(result, Err(EnvelopeError::Signature { .. })));
}
