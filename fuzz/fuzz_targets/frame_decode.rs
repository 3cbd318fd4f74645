//! Fuzz target for envelope decoding up to the signature.
//!
//! Walks arbitrary bytes through every decoder that runs before any key is
//! touched:
//! - Outer frame (magic, version, size limit)
//! - Encryption tuple and its field-presence checks
//! - Signature tuple, when the content is plaintext
//! - Standalone commitment
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use cachet_core::{Commitment, Encryption, Signature};
use cachet_proto::frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = frame::decode(data) {
        if let Ok(encryption) = Encryption::decode(body) {
            if let (false, Some(content)) = (encryption.is_encrypted(), encryption.ciphertext()) {
                let _ = Signature::decode(content);
            }
        }
    }

    // Unframed bytes exercise the tuple decoders directly
    let _ = Encryption::decode(data);
    let _ = Signature::decode(data);
    let _ = Commitment::decode(data);
});
