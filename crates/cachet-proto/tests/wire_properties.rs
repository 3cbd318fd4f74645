//! Property-based tests for the wire vocabulary.
//!
//! Round trips must be identity for every input, and decoders must reject
//! (never panic on) arbitrary bytes.

use bytes::Bytes;
use cachet_proto::{ErrorPayload, Payload, PayloadTag, frame, wire};
use proptest::prelude::*;

fn arbitrary_payload() -> impl Strategy<Value = Payload> {
    (any::<u16>(), prop::collection::vec(any::<u8>(), 0..2048))
        .prop_map(|(tag, body)| Payload::new(PayloadTag(tag), Bytes::from(body)))
}

proptest! {
    #[test]
    fn prop_payload_round_trip(payload in arbitrary_payload()) {
        let encoded = payload.encode().expect("encode should succeed");
        let decoded = Payload::decode(&encoded).expect("decode should succeed");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(decoded, payload);
    }

    #[test]
    fn prop_frame_round_trip(body in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut wire = Vec::new();
        frame::encode(&body, &mut wire).expect("encode should succeed");

        prop_assert_eq!(wire.len(), frame::PREFIX_SIZE + body.len());
        prop_assert_eq!(frame::decode(&wire).expect("decode should succeed"), body.as_slice());
    }

    #[test]
    fn prop_truncated_payload_rejected(payload in arbitrary_payload(), cut in 1usize..16) {
        let encoded = payload.encode().expect("encode should succeed");
        let cut = cut.min(encoded.len());

        // PROPERTY: Any strict prefix fails to decode
        prop_assert!(Payload::decode(&encoded[..encoded.len() - cut]).is_err());
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Payload::decode(&bytes);
        let _ = ErrorPayload::decode(&bytes);
        let _ = wire::decode_any(&bytes);
        let _ = frame::decode(&bytes);
    }

    #[test]
    fn prop_error_reply_round_trip(code in any::<u16>(), message in ".{0,64}") {
        let reply = ErrorPayload { code, message };
        let decoded = ErrorPayload::decode(&reply.encode().expect("encode should succeed"))
            .expect("decode should succeed");

        prop_assert_eq!(decoded, reply);
    }
}
