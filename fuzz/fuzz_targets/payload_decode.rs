//! Fuzz target for the inner layers.
//!
//! Feeds arbitrary bytes to the compression unwrapper (declared-length
//! checks, zstd stream) and the payload and error-reply decoders.
//!
//! # Invariants
//!
//! - NEVER panic
//! - A successful unwrap never yields more than the size limit

#![no_main]

use cachet_core::compression;
use cachet_proto::{ErrorPayload, Payload};
use libfuzzer_sys::fuzz_target;

const LIMIT: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = compression::unwrap(data, LIMIT) {
        assert!(payload.body().len() <= LIMIT);
        let _ = ErrorPayload::from_payload(&payload);
    }

    if let Ok(payload) = Payload::decode(data) {
        let reencoded = payload.encode().expect("decoded payload re-encodes");
        assert_eq!(Payload::decode(&reencoded).ok(), Some(payload));
    }

    let _ = ErrorPayload::decode(data);
});
