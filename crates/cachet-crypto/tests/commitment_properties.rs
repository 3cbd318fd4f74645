//! Property tests for commitment proofs and key wrapping.

use std::{num::NonZeroUsize, sync::Arc, thread};

use cachet_crypto::{
    BigUint, CryptoError, Digest, KeyCache, ProofParams, SYMMETRIC_KEY_SIZE, Secret, SymmetricKey,
    commitment, test_utils,
};
use proptest::prelude::*;

fn toy_params() -> ProofParams {
    ProofParams::new(400).expect("valid bound")
}

#[test]
fn toy_group_soundness() {
    let key = test_utils::toy_key();
    let public = key.public_key();
    let message = Digest::of(b"soundness");

    let secret = Secret::from_biguint(BigUint::from(42u32)).unwrap();
    let value = commitment::commit(public, &secret);
    assert_eq!(value, BigUint::from(2u32).modpow(&BigUint::from(42u32), &BigUint::from(2773u32)));

    let nonce = vec![0x5A; toy_params().nonce_len()];
    let proof = commitment::prove(public, &secret, &message, toy_params(), &nonce).unwrap();
    commitment::verify(public, &value, &message, &proof, toy_params()).unwrap();

    // Any other commitment value rejects the same proof
    let mut rejected = 0;
    for other in 1u32..64 {
        let other_secret = Secret::from_biguint(BigUint::from(other)).unwrap();
        let other_value = commitment::commit(public, &other_secret);
        if other_value == value {
            continue;
        }
        assert_eq!(
            commitment::verify(public, &other_value, &message, &proof, toy_params()),
            Err(CryptoError::ChallengeMismatch)
        );
        rejected += 1;
    }
    assert!(rejected > 0);
}

#[test]
fn concurrent_wraps_converge_on_one_entry() {
    let cache = Arc::new(KeyCache::new(NonZeroUsize::new(16).unwrap()));
    let key = Arc::new(test_utils::host_key(2));
    let sym = SymmetricKey::from_bytes([0x3C; SYMMETRIC_KEY_SIZE]);

    let results: Vec<Vec<u8>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let key = Arc::clone(&key);
                let sym = sym.clone();
                scope.spawn(move || cache.encrypt_key(key.public_key(), &sym).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(cache.stats().encrypt_entries, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_proof_verifies_for_any_message_and_nonce(
        message in any::<[u8; 32]>(),
        nonce in prop::collection::vec(any::<u8>(), 50),
        secret in 1u32..2772,
    ) {
        let key = test_utils::toy_key();
        let public = key.public_key();
        let message = Digest::from_bytes(message);
        let secret = Secret::from_biguint(BigUint::from(secret)).unwrap();
        let value = commitment::commit(public, &secret);

        let proof = commitment::prove(public, &secret, &message, toy_params(), &nonce).unwrap();

        // PROPERTY: Honest proofs always verify
        prop_assert!(commitment::verify(public, &value, &message, &proof, toy_params()).is_ok());
    }

    #[test]
    fn prop_tampered_challenge_rejected(
        bit in 0usize..256,
        nonce in prop::collection::vec(any::<u8>(), 304),
    ) {
        let key = test_utils::host_key(0);
        let public = key.public_key();
        let message = Digest::of(b"tamper");
        let secret = Secret::from_biguint(BigUint::from(987_654_321u64)).unwrap();
        let value = commitment::commit(public, &secret);
        let params = ProofParams::DEFAULT;

        let proof = commitment::prove(public, &secret, &message, params, &nonce).unwrap();
        let mut challenge = *proof.challenge().as_bytes();
        challenge[bit / 8] ^= 1 << (bit % 8);
        let tampered = cachet_crypto::Proof::from_parts(
            Digest::from_bytes(challenge),
            proof.is_negative(),
            &proof.magnitude_bytes(),
        )
        .unwrap();

        // PROPERTY: Flipping any challenge bit breaks the proof
        prop_assert!(commitment::verify(public, &value, &message, &tampered, params).is_err());
    }

    #[test]
    fn prop_wrap_unwrap_identity(bytes in any::<[u8; SYMMETRIC_KEY_SIZE]>(), index in 0usize..3) {
        let key = test_utils::host_key(index);
        let cache = KeyCache::new(NonZeroUsize::new(4).unwrap());
        let sym = SymmetricKey::from_bytes(bytes);

        let wrapped = cache.encrypt_key(key.public_key(), &sym).unwrap();
        prop_assert_eq!(cache.decrypt_key(&key, &wrapped).unwrap(), sym);
    }
}
