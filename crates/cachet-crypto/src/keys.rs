//! Composite-group host keys.
//!
//! A host key is an RSA-type modulus `n = p * q` with public exponent `e`,
//! private exponent `d`, and a published generator `g`. The same group serves
//! three purposes:
//!
//! - Key wrapping: a symmetric key `k` travels as `k^e mod n`
//! - Host signatures: `sig = H(m)^d mod n`, checked with `sig^e == H(m)`
//! - Commitments: a client publishes `g^x mod n` for a secret `x` (see
//!   [`crate::commitment`])
//!
//! # Security
//!
//! The factorisation of `n` (and therefore the group order) is known only to
//! the host. Commitment proofs rely on that: responses are computed over the
//! integers, never reduced modulo the order.

use std::fmt;

use num_bigint_dig::{BigUint, ModInverse, RandPrime};
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    hash::{Digest, HASH_BITS},
};

/// Public exponent used for generated keys.
pub const DEFAULT_PUBLIC_EXPONENT: u32 = 65_537;

/// Smallest modulus [`PrivateKey::generate`] accepts.
pub const MIN_GENERATED_MODULUS_BITS: usize = 512;

/// Domain separator for key fingerprints.
const FINGERPRINT_LABEL: &[u8] = b"cachet-key-fingerprint-v1";

/// Public half of a host key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    modulus: BigUint,
    exponent: BigUint,
    generator: BigUint,
    fingerprint: Digest,
}

impl PublicKey {
    /// Assemble a public key from its components.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKey` if the modulus is even or tiny, the
    ///   exponent is below 3, or the generator is not in `[2, n - 1)`
    pub fn new(
        modulus: BigUint,
        exponent: BigUint,
        generator: BigUint,
    ) -> Result<Self, CryptoError> {
        if modulus <= BigUint::from(3u32) || (&modulus % BigUint::from(2u32)).is_zero() {
            return Err(CryptoError::InvalidKey { reason: "modulus must be odd and > 3".into() });
        }
        if exponent < BigUint::from(3u32) {
            return Err(CryptoError::InvalidKey { reason: "public exponent must be >= 3".into() });
        }
        if generator < BigUint::from(2u32) || generator >= &modulus - BigUint::one() {
            return Err(CryptoError::InvalidKey {
                reason: "generator must lie in [2, n - 1)".into(),
            });
        }

        let fingerprint = fingerprint(&modulus, &exponent, &generator);
        Ok(Self { modulus, exponent, generator, fingerprint })
    }

    /// Modulus `n`.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Public exponent `e`.
    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// Published generator `g`.
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Size of the modulus in bits.
    pub fn modulus_bits(&self) -> usize {
        self.modulus.bits()
    }

    /// Width in bytes of an encoded group element.
    pub fn element_len(&self) -> usize {
        self.modulus_bits().div_ceil(8)
    }

    /// SHA-256 over the key components; stable identity of this key.
    pub fn fingerprint(&self) -> &Digest {
        &self.fingerprint
    }

    /// True if `value` is a non-zero residue modulo `n`.
    pub fn contains(&self, value: &BigUint) -> bool {
        !value.is_zero() && value < &self.modulus
    }

    /// Encode a group element as fixed-width big-endian bytes.
    pub fn encode_element(&self, value: &BigUint) -> Vec<u8> {
        debug_assert!(value < &self.modulus);

        let raw = value.to_bytes_be();
        let width = self.element_len();
        let mut out = vec![0u8; width.saturating_sub(raw.len())];
        out.extend_from_slice(&raw);
        out
    }

    /// Decode a fixed-width group element.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidLength` if `bytes` is not [`Self::element_len`]
    ///   long
    /// - `CryptoError::InvalidGroupElement` if the value is zero or `>= n`
    pub fn decode_element(&self, bytes: &[u8]) -> Result<BigUint, CryptoError> {
        if bytes.len() != self.element_len() {
            return Err(CryptoError::InvalidLength {
                what: "group element",
                expected: self.element_len(),
                actual: bytes.len(),
            });
        }

        let value = BigUint::from_bytes_be(bytes);
        if !self.contains(&value) {
            return Err(CryptoError::InvalidGroupElement);
        }
        Ok(value)
    }

    /// Compute `m^e mod n`.
    pub fn encrypt_raw(&self, message: &BigUint) -> Result<BigUint, CryptoError> {
        if message >= &self.modulus {
            return Err(CryptoError::ModulusTooSmall {
                bits: self.modulus_bits(),
                required: message.bits(),
            });
        }
        Ok(message.modpow(&self.exponent, &self.modulus))
    }

    /// Verify a host signature over `digest`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidLength` if the signature is not element-width
    /// - `CryptoError::InvalidSignature` if `sig^e mod n != digest`
    pub fn verify_digest(&self, digest: &Digest, signature: &[u8]) -> Result<(), CryptoError> {
        if signature.len() != self.element_len() {
            return Err(CryptoError::InvalidLength {
                what: "host signature",
                expected: self.element_len(),
                actual: signature.len(),
            });
        }

        let sig = BigUint::from_bytes_be(signature);
        if sig >= self.modulus {
            return Err(CryptoError::InvalidSignature);
        }

        if sig.modpow(&self.exponent, &self.modulus) != digest.to_biguint() {
            return Err(CryptoError::InvalidSignature);
        }
        Ok(())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.modulus_bits())
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Private half of a host key, carrying its public half.
///
/// The private exponent is zeroized on drop and never printed.
#[derive(Clone)]
pub struct PrivateKey {
    public: PublicKey,
    exponent: BigUint,
}

impl PrivateKey {
    /// Assemble a key pair from its components.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKey` if the public part is invalid or `d` does
    ///   not invert `e` (checked on the generator)
    pub fn from_components(
        modulus: BigUint,
        public_exponent: BigUint,
        private_exponent: BigUint,
        generator: BigUint,
    ) -> Result<Self, CryptoError> {
        let public = PublicKey::new(modulus, public_exponent, generator)?;
        if private_exponent.is_zero() || private_exponent >= public.modulus {
            return Err(CryptoError::InvalidKey { reason: "private exponent out of range".into() });
        }

        let probe = public.generator.modpow(&public.exponent, &public.modulus);
        if probe.modpow(&private_exponent, &public.modulus) != public.generator {
            return Err(CryptoError::InvalidKey {
                reason: "private exponent does not match public exponent".into(),
            });
        }

        Ok(Self { public, exponent: private_exponent })
    }

    /// Generate a fresh key pair with a `bits`-bit modulus.
    ///
    /// Uses `e = 65537` and a random quadratic residue as generator.
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        bits: usize,
    ) -> Result<Self, CryptoError> {
        if bits < MIN_GENERATED_MODULUS_BITS {
            return Err(CryptoError::ModulusTooSmall {
                bits,
                required: MIN_GENERATED_MODULUS_BITS - 1,
            });
        }

        let exponent = BigUint::from(DEFAULT_PUBLIC_EXPONENT);
        loop {
            let p = rng.gen_prime(bits / 2);
            let q = rng.gen_prime(bits - bits / 2);
            if p == q {
                continue;
            }

            let modulus = &p * &q;
            if modulus.bits() != bits {
                continue;
            }

            let totient = (p - BigUint::one()) * (q - BigUint::one());
            let Some(private_exponent) =
                exponent.clone().mod_inverse(&totient).and_then(|d| d.to_biguint())
            else {
                continue;
            };

            let generator = random_quadratic_residue(rng, &modulus);
            return Self::from_components(modulus, exponent, private_exponent, generator);
        }
    }

    /// Public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Private exponent `d`, for writing key files.
    pub fn private_exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// Compute `c^d mod n`.
    pub fn decrypt_raw(&self, ciphertext: &BigUint) -> Result<BigUint, CryptoError> {
        if ciphertext >= &self.public.modulus {
            return Err(CryptoError::InvalidGroupElement);
        }
        Ok(ciphertext.modpow(&self.exponent, &self.public.modulus))
    }

    /// Sign a digest: `H^d mod n`, encoded element-width.
    ///
    /// # Errors
    ///
    /// - `CryptoError::ModulusTooSmall` if the modulus cannot hold a digest
    pub fn sign_digest(&self, digest: &Digest) -> Result<Vec<u8>, CryptoError> {
        if self.public.modulus_bits() <= HASH_BITS {
            return Err(CryptoError::ModulusTooSmall {
                bits: self.public.modulus_bits(),
                required: HASH_BITS,
            });
        }

        let sig = digest.to_biguint().modpow(&self.exponent, &self.public.modulus);
        Ok(self.public.encode_element(&sig))
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.exponent.zeroize();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("public", &self.public).finish_non_exhaustive()
    }
}

fn fingerprint(modulus: &BigUint, exponent: &BigUint, generator: &BigUint) -> Digest {
    let n = modulus.to_bytes_be();
    let e = exponent.to_bytes_be();
    let g = generator.to_bytes_be();

    Digest::of_parts(&[
        FINGERPRINT_LABEL,
        &(n.len() as u32).to_be_bytes(),
        &n,
        &(e.len() as u32).to_be_bytes(),
        &e,
        &(g.len() as u32).to_be_bytes(),
        &g,
    ])
}

fn random_quadratic_residue<R: RngCore + CryptoRng>(rng: &mut R, modulus: &BigUint) -> BigUint {
    let two = BigUint::from(2u32);
    let upper = modulus - BigUint::one();
    let mut buf = vec![0u8; modulus.bits().div_ceil(8) + 8];

    loop {
        rng.fill_bytes(&mut buf);
        let root = BigUint::from_bytes_be(&buf) % modulus;
        let candidate = root.modpow(&two, modulus);
        if candidate >= two && candidate < upper {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::test_utils;

    #[test]
    fn toy_key_round_trips_raw_exponentiation() {
        let key = test_utils::toy_key();
        let message = BigUint::from(1234u32);

        let ciphertext = key.public_key().encrypt_raw(&message).unwrap();
        assert_eq!(key.decrypt_raw(&ciphertext).unwrap(), message);
    }

    #[test]
    fn reject_mismatched_private_exponent() {
        let result = PrivateKey::from_components(
            BigUint::from(2773u32),
            BigUint::from(17u32),
            BigUint::from(158u32),
            BigUint::from(2u32),
        );
        assert!(matches!(result, Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn reject_even_modulus() {
        let result =
            PublicKey::new(BigUint::from(2774u32), BigUint::from(17u32), BigUint::from(2u32));
        assert!(matches!(result, Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn host_signature_verifies() {
        let key = test_utils::host_key(0);
        let digest = Digest::of(b"signed content");

        let signature = key.sign_digest(&digest).unwrap();
        assert_eq!(signature.len(), key.public_key().element_len());
        key.public_key().verify_digest(&digest, &signature).unwrap();
    }

    #[test]
    fn host_signature_rejects_other_digest_and_other_key() {
        let key = test_utils::host_key(0);
        let signature = key.sign_digest(&Digest::of(b"a")).unwrap();

        assert_eq!(
            key.public_key().verify_digest(&Digest::of(b"b"), &signature),
            Err(CryptoError::InvalidSignature)
        );

        let other = test_utils::host_key(1);
        assert!(other.public_key().verify_digest(&Digest::of(b"a"), &signature).is_err());
    }

    #[test]
    fn toy_key_cannot_sign() {
        let key = test_utils::toy_key();
        assert!(matches!(
            key.sign_digest(&Digest::of(b"x")),
            Err(CryptoError::ModulusTooSmall { .. })
        ));
    }

    #[test]
    fn element_encoding_is_fixed_width() {
        let key = test_utils::host_key(0);
        let public = key.public_key();

        let encoded = public.encode_element(&BigUint::from(5u32));
        assert_eq!(encoded.len(), public.element_len());
        assert_eq!(public.decode_element(&encoded).unwrap(), BigUint::from(5u32));
        assert!(public.decode_element(&encoded[1..]).is_err());
    }

    #[test]
    fn decode_element_rejects_zero_and_modulus() {
        let key = test_utils::host_key(0);
        let public = key.public_key();

        let zero = vec![0u8; public.element_len()];
        assert_eq!(public.decode_element(&zero), Err(CryptoError::InvalidGroupElement));

        let n = public.encode_element(&(public.modulus() - BigUint::one()));
        assert!(public.decode_element(&n).is_ok());
        let n = public.modulus().to_bytes_be();
        assert_eq!(public.decode_element(&n), Err(CryptoError::InvalidGroupElement));
    }

    #[test]
    fn fingerprints_distinguish_keys() {
        assert_ne!(
            test_utils::host_key(0).public_key().fingerprint(),
            test_utils::host_key(1).public_key().fingerprint()
        );
        assert_eq!(
            test_utils::host_key(0).public_key().fingerprint(),
            test_utils::host_key(0).public_key().fingerprint()
        );
    }

    #[test]
    fn generated_key_is_consistent() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let key = PrivateKey::generate(&mut rng, 512).unwrap();

        assert_eq!(key.public_key().modulus_bits(), 512);
        assert_eq!(key.public_key().exponent(), &BigUint::from(DEFAULT_PUBLIC_EXPONENT));

        let digest = Digest::of(b"generated");
        let signature = key.sign_digest(&digest).unwrap();
        key.public_key().verify_digest(&digest, &signature).unwrap();
    }

    #[test]
    fn generate_rejects_small_modulus() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        assert!(PrivateKey::generate(&mut rng, 256).is_err());
    }
}
