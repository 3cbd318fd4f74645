//! Zero-knowledge proof of knowledge of a committed exponent.
//!
//! A client picks a secret `x` and publishes the commitment `y = g^x mod n`
//! in the host's group. Later it proves knowledge of `x` bound to a message
//! `m` without revealing it:
//!
//! ```text
//! prove:   r <- random B-bit integer
//!          t  = H(g^r mod n)
//!          h  = t XOR m               (as a 256-bit integer)
//!          s  = r - x*h               (over the integers, not reduced)
//!
//! verify:  |s| < 2^B
//!          v  = g^s * y^h mod n       (g^s via g^-1 when s < 0)
//!          H(v) == t
//! ```
//!
//! The group order is secret to the host, so `s` is never reduced; the
//! bound `B` must exceed `bits(x) + 256` by a statistical margin so that `r`
//! masks `x*h`.

use std::fmt;

use num_bigint_dig::{BigUint, ModInverse};
use num_traits::Zero;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    hash::{Digest, HASH_BITS},
    keys::PublicKey,
};

/// Extra bits of `r` beyond `bits(x*h)`.
pub const STATISTICAL_MARGIN_BITS: usize = 128;

/// Client secret exponent `x`.
///
/// Zeroized on drop. Not `Clone`; `Debug` is redacted.
pub struct Secret(BigUint);

impl Secret {
    /// Wrap an existing exponent.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidGroupElement` if `value` is zero
    pub fn from_biguint(value: BigUint) -> Result<Self, CryptoError> {
        if value.is_zero() {
            return Err(CryptoError::InvalidGroupElement);
        }
        Ok(Self(value))
    }

    /// Derive a secret from uniformly random bytes, reduced modulo `n`.
    ///
    /// `random` must be exactly `public.element_len()` bytes.
    pub fn from_random(public: &PublicKey, random: &[u8]) -> Result<Self, CryptoError> {
        if random.len() != public.element_len() {
            return Err(CryptoError::InvalidLength {
                what: "secret randomness",
                expected: public.element_len(),
                actual: random.len(),
            });
        }

        let mut raw = BigUint::from_bytes_be(random);
        let value = &raw % public.modulus();
        raw.zeroize();
        Self::from_biguint(value)
    }

    /// Bit length of the secret.
    pub fn bits(&self) -> usize {
        self.0.bits()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Compute the public commitment `g^x mod n`.
pub fn commit(public: &PublicKey, secret: &Secret) -> BigUint {
    public.generator().modpow(&secret.0, public.modulus())
}

/// Bound on the proof's random exponent and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofParams {
    exponent_bits: usize,
}

impl ProofParams {
    /// Default bound; covers secrets drawn from moduli up to 2048 bits.
    pub const DEFAULT: Self = Self { exponent_bits: 2432 };

    /// Smallest bound accepted by [`Self::new`].
    pub const MIN_EXPONENT_BITS: usize = HASH_BITS + STATISTICAL_MARGIN_BITS;

    /// Create parameters with bound `B = exponent_bits`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::ProofBoundTooSmall` if the bound is below
    ///   [`Self::MIN_EXPONENT_BITS`] or not a whole number of bytes
    pub fn new(exponent_bits: usize) -> Result<Self, CryptoError> {
        if exponent_bits < Self::MIN_EXPONENT_BITS || exponent_bits % 8 != 0 {
            return Err(CryptoError::ProofBoundTooSmall {
                bound: exponent_bits,
                required: Self::MIN_EXPONENT_BITS,
            });
        }
        Ok(Self { exponent_bits })
    }

    /// Bound `B` in bits.
    pub fn exponent_bits(&self) -> usize {
        self.exponent_bits
    }

    /// Random bytes [`prove`] consumes.
    pub fn nonce_len(&self) -> usize {
        self.exponent_bits / 8
    }
}

impl Default for ProofParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Proof of knowledge: challenge digest plus signed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    challenge: Digest,
    negative: bool,
    magnitude: BigUint,
}

impl Proof {
    /// Rebuild a proof from its wire parts.
    ///
    /// The magnitude must be minimal big-endian (no leading zero byte,
    /// zero encoded as a single `0x00`), and zero cannot be negative.
    pub fn from_parts(
        challenge: Digest,
        negative: bool,
        magnitude: &[u8],
    ) -> Result<Self, CryptoError> {
        let canonical = match magnitude {
            [] => false,
            [0] => !negative,
            [0, ..] => false,
            _ => true,
        };
        if !canonical {
            return Err(CryptoError::NonCanonical { what: "proof response" });
        }

        Ok(Self { challenge, negative, magnitude: BigUint::from_bytes_be(magnitude) })
    }

    /// Challenge digest `t`.
    pub fn challenge(&self) -> &Digest {
        &self.challenge
    }

    /// True if the response `s` is negative.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Minimal big-endian encoding of `|s|`.
    pub fn magnitude_bytes(&self) -> Vec<u8> {
        self.magnitude.to_bytes_be()
    }
}

/// Prove knowledge of `secret` behind `commit(public, secret)`, bound to
/// `message`.
///
/// `nonce` supplies the random exponent `r` and must be
/// `params.nonce_len()` bytes of fresh randomness.
///
/// # Errors
///
/// - `CryptoError::ProofBoundTooSmall` if `B < bits(x) + 256 + 128`
/// - `CryptoError::InvalidLength` if the nonce has the wrong length
pub fn prove(
    public: &PublicKey,
    secret: &Secret,
    message: &Digest,
    params: ProofParams,
    nonce: &[u8],
) -> Result<Proof, CryptoError> {
    let required = secret.bits() + HASH_BITS + STATISTICAL_MARGIN_BITS;
    if params.exponent_bits < required {
        return Err(CryptoError::ProofBoundTooSmall { bound: params.exponent_bits, required });
    }
    if nonce.len() != params.nonce_len() {
        return Err(CryptoError::InvalidLength {
            what: "proof nonce",
            expected: params.nonce_len(),
            actual: nonce.len(),
        });
    }

    let mut r = BigUint::from_bytes_be(nonce);
    let witness = public.generator().modpow(&r, public.modulus());
    let challenge = Digest::of(&public.encode_element(&witness));
    let h = challenge.xor(message).to_biguint();

    let mut xh = &secret.0 * &h;
    let (negative, magnitude) = if r >= xh { (false, &r - &xh) } else { (true, &xh - &r) };
    r.zeroize();
    xh.zeroize();

    let negative = negative && !magnitude.is_zero();
    Ok(Proof { challenge, negative, magnitude })
}

/// Verify a proof against the commitment `value`.
///
/// # Errors
///
/// - `CryptoError::InvalidGroupElement` if `value` is not in the group or
///   `g` is not invertible
/// - `CryptoError::ResponseTooLarge` if `|s| >= 2^B`
/// - `CryptoError::ChallengeMismatch` if the recomputed witness does not
///   hash to the challenge
pub fn verify(
    public: &PublicKey,
    value: &BigUint,
    message: &Digest,
    proof: &Proof,
    params: ProofParams,
) -> Result<(), CryptoError> {
    if !public.contains(value) {
        return Err(CryptoError::InvalidGroupElement);
    }

    let bits = proof.magnitude.bits();
    if bits > params.exponent_bits {
        return Err(CryptoError::ResponseTooLarge { bits, bound: params.exponent_bits });
    }

    let modulus = public.modulus();
    let base = if proof.negative {
        public
            .generator()
            .clone()
            .mod_inverse(modulus)
            .and_then(|inverse| inverse.to_biguint())
            .ok_or(CryptoError::InvalidGroupElement)?
    } else {
        public.generator().clone()
    };

    let h = proof.challenge.xor(message).to_biguint();
    let witness = (base.modpow(&proof.magnitude, modulus) * value.modpow(&h, modulus)) % modulus;

    if witness.is_zero() || Digest::of(&public.encode_element(&witness)) != proof.challenge {
        return Err(CryptoError::ChallengeMismatch);
    }
    Ok(())
}
