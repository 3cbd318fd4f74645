//! Codec configuration.

use std::{num::NonZeroUsize, time::Duration};

use cachet_crypto::{HASH_BITS, ProofParams, STATISTICAL_MARGIN_BITS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum signature age: one tropical year.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(31_556_925);

/// Default tolerance for signature times ahead of the local clock.
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Default proof bound `B`: 2048-bit secrets plus challenge and margin.
pub const DEFAULT_PROOF_EXPONENT_BITS: usize = 2048 + HASH_BITS + STATISTICAL_MARGIN_BITS;

/// Default zstd level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Default per-direction key cache bound.
pub const DEFAULT_KEY_CACHE_CAPACITY: usize = 1024;

/// Configuration rejected by [`CodecConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Staleness window is zero
    #[error("staleness window must be non-zero")]
    ZeroStalenessWindow,

    /// Key cache capacity is zero
    #[error("key cache capacity must be non-zero")]
    ZeroCacheCapacity,

    /// Size limit is zero
    #[error("max payload size must be non-zero")]
    ZeroPayloadSize,

    /// Proof bound is too small or not byte-aligned
    #[error("proof exponent bits {bits} invalid: need a multiple of 8, at least {required}")]
    ProofBound {
        /// Configured bound
        bits: usize,
        /// Minimum bound
        required: usize,
    },

    /// Host modulus too large for client commitments under the proof bound
    #[error("{bits}-bit modulus exceeds the {max} bits the proof bound covers")]
    ModulusTooLarge {
        /// Modulus size
        bits: usize,
        /// Largest size covered
        max: usize,
    },
}

/// Envelope codec configuration.
///
/// Durations are (de)serialized as whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum age of a signature's time relative to verification time
    #[serde(with = "duration_secs")]
    pub staleness_window: Duration,
    /// Maximum amount a signature's time may lie in the future
    #[serde(with = "duration_secs")]
    pub max_clock_skew: Duration,
    /// Bit-length bound `B` on proof nonces and responses
    pub proof_exponent_bits: usize,
    /// zstd compression level (clamped to 1..=22)
    pub compression_level: i32,
    /// Maximum decompressed payload size
    pub max_payload_size: usize,
    /// Entries per direction in the key cache
    pub key_cache_capacity: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            staleness_window: DEFAULT_STALENESS_WINDOW,
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
            proof_exponent_bits: DEFAULT_PROOF_EXPONENT_BITS,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_payload_size: cachet_proto::MAX_PAYLOAD_SIZE,
            key_cache_capacity: DEFAULT_KEY_CACHE_CAPACITY,
        }
    }
}

impl CodecConfig {
    /// Check the configuration for values the codec cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staleness_window.is_zero() {
            return Err(ConfigError::ZeroStalenessWindow);
        }
        if self.key_cache_capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        if self.max_payload_size == 0 {
            return Err(ConfigError::ZeroPayloadSize);
        }
        self.proof_params()?;
        Ok(())
    }

    /// Proof parameters for the configured bound.
    pub fn proof_params(&self) -> Result<ProofParams, ConfigError> {
        ProofParams::new(self.proof_exponent_bits).map_err(|_| ConfigError::ProofBound {
            bits: self.proof_exponent_bits,
            required: ProofParams::MIN_EXPONENT_BITS,
        })
    }

    /// Largest host modulus whose commitment secrets the proof bound covers.
    ///
    /// Secrets are reduced modulo `n`, so `B >= bits(n) + 256 + 128`
    /// guarantees every client proof under such a key can be produced.
    pub fn max_modulus_bits(&self) -> usize {
        self.proof_exponent_bits.saturating_sub(HASH_BITS + STATISTICAL_MARGIN_BITS)
    }

    /// Check that host keys of `bits` can back client commitments.
    pub fn check_modulus_bits(&self, bits: usize) -> Result<(), ConfigError> {
        let max = self.max_modulus_bits();
        if bits > max {
            return Err(ConfigError::ModulusTooLarge { bits, max });
        }
        Ok(())
    }

    /// Key cache capacity as a non-zero count.
    pub fn cache_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.key_cache_capacity).ok_or(ConfigError::ZeroCacheCapacity)
    }

    /// Compression level clamped to zstd's supported range.
    pub fn compression_level(&self) -> i32 {
        self.compression_level.clamp(1, 22)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
