//! Fuzz target for CBOR deserialization attacks
//!
//! Harden the tagged tuple decoders against hostile CBOR
//!
//! # Strategy
//!
//! - Deeply nested: Arrays/maps nested to arbitrary depth as tuple fields
//! - Huge lengths: CBOR claiming massive byte/string/array lengths
//! - Random bytes: Arbitrary field bytes behind every known tag
//! - Type confusion: Fields of one layer presented under another layer's tag
//! - Duplicate keys: CBOR maps with repeated key names
//!
//! # Invariants
//!
//! - Deserialization completes quickly (no infinite loops)
//! - Deeply nested structures handled gracefully
//! - Huge claimed lengths rejected (not allocated)
//! - Type confusion returns error
//! - NEVER panic on malformed CBOR

#![no_main]

use arbitrary::Arbitrary;
use cachet_core::{Commitment, Encryption, Signature, compression};
use cachet_proto::{ErrorPayload, Payload, Tag, wire};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum CborAttack {
    DeeplyNested { depth: u8, payload_type: PayloadType },
    HugeLength { claimed_len_exponent: u8 },
    RandomBytes { bytes: Vec<u8> },
    TypeConfusion { tag: u16, wrong_fields: Vec<u8> },
    DuplicateKeys { count: u8 },
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadType {
    Array,
    Map,
    Bytes,
    String,
}

const TAGS: [Tag; 8] = [
    Tag::Payload,
    Tag::Compression,
    Tag::HostSignature,
    Tag::ClientSignature,
    Tag::CredentialsSignature,
    Tag::Commitment,
    Tag::Encryption,
    Tag::ErrorReply,
];

fuzz_target!(|attack: CborAttack| {
    match attack {
        CborAttack::DeeplyNested { depth, payload_type } => {
            let actual_depth = (depth % 50) as usize;
            let fields = create_nested_cbor(actual_depth, &payload_type);

            for tag in TAGS {
                decode_all(&tagged(tag.to_u16(), &fields));
            }
        }

        CborAttack::HugeLength { claimed_len_exponent } => {
            let exponent = (claimed_len_exponent % 21) as u32;
            let claimed_length = if exponent < 20 { 1u32 << exponent } else { u32::MAX };

            let attacks = [
                create_huge_byte_string(claimed_length),
                create_huge_text_string(claimed_length),
                create_huge_array(claimed_length),
            ];

            for fields in attacks {
                for tag in [Tag::Compression, Tag::HostSignature, Tag::Encryption] {
                    decode_all(&tagged(tag.to_u16(), &fields));
                }
            }
        }

        CborAttack::RandomBytes { bytes } => {
            decode_all(&bytes);
            for tag in TAGS {
                decode_all(&tagged(tag.to_u16(), &bytes));
            }
        }

        CborAttack::TypeConfusion { tag, wrong_fields } => {
            decode_all(&tagged(tag, &wrong_fields));
        }

        CborAttack::DuplicateKeys { count } => {
            let actual_count = (count % 10).max(2);
            let mut fields = vec![0xA0 | actual_count];

            for _ in 0..actual_count {
                fields.push(0x67);
                fields.extend_from_slice(b"subject");
                fields.push(0x01);
            }

            decode_all(&tagged(Tag::ClientSignature.to_u16(), &fields));
        }
    }
});

fn decode_all(bytes: &[u8]) {
    let _ = wire::decode_any(bytes);
    let _ = Payload::decode(bytes);
    let _ = ErrorPayload::decode(bytes);
    let _ = compression::unwrap(bytes, 64 * 1024);
    let _ = Signature::decode(bytes);
    let _ = Commitment::decode(bytes);
    let _ = Encryption::decode(bytes);
}

/// `[tag, <raw fields>]` as a two-element CBOR array.
fn tagged(tag: u16, fields: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x82, 0x19];
    bytes.extend_from_slice(&tag.to_be_bytes());
    bytes.extend_from_slice(fields);
    bytes
}

fn create_nested_cbor(depth: usize, payload_type: &PayloadType) -> Vec<u8> {
    let mut bytes = Vec::new();

    match payload_type {
        PayloadType::Array => {
            for _ in 0..depth {
                bytes.push(0x81);
            }
            bytes.push(0x01);
        }
        PayloadType::Map => {
            for _ in 0..depth {
                bytes.push(0xA1);
                bytes.push(0x61);
                bytes.push(b'a');
            }
            bytes.push(0x01);
        }
        PayloadType::Bytes => {
            for _ in 0..depth {
                bytes.push(0x81);
            }
            bytes.push(0x41);
            bytes.push(0x00);
        }
        PayloadType::String => {
            for _ in 0..depth {
                bytes.push(0x81);
            }
            bytes.push(0x61);
            bytes.push(b'x');
        }
    }

    bytes
}

fn create_huge_byte_string(claimed_length: u32) -> Vec<u8> {
    let mut bytes = vec![0x5A];
    bytes.extend_from_slice(&claimed_length.to_be_bytes());
    bytes.extend(vec![0xAA; (claimed_length as usize).min(10)]);
    bytes
}

fn create_huge_text_string(claimed_length: u32) -> Vec<u8> {
    let mut bytes = vec![0x7A];
    bytes.extend_from_slice(&claimed_length.to_be_bytes());
    bytes.extend(vec![b'x'; (claimed_length as usize).min(10)]);
    bytes
}

fn create_huge_array(claimed_length: u32) -> Vec<u8> {
    let mut bytes = vec![0x9A];
    bytes.extend_from_slice(&claimed_length.to_be_bytes());
    for _ in 0..(claimed_length as usize).min(5) {
        bytes.push(0x01);
    }
    bytes
}
