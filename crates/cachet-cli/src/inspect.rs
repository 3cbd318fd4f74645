//! Unverified envelope inspection.
//!
//! Reads only what can be read without keys: the outer Encryption metadata
//! and, for plaintext content, the claimed signature. Nothing printed here
//! is authenticated.

use std::io;

use cachet_core::{Encryption, EnvelopeError, Layer, Signature, SignatureProof};
use cachet_proto::frame;

/// Describe an envelope for an operator.
pub fn describe(bytes: &[u8]) -> Result<String, EnvelopeError> {
    let body = frame::decode(bytes).map_err(|e| EnvelopeError::encoding(Layer::Encryption, e))?;
    let encryption = Encryption::decode(body)?;

    let mut out = String::new();
    let recipient =
        encryption.recipient().map_or_else(|| "(reply)".to_string(), ToString::to_string);
    line(&mut out, "size", bytes.len());
    line(&mut out, "time", encryption.time());
    line(&mut out, "recipient", recipient);
    line(&mut out, "encrypted", encryption.is_encrypted());
    line(&mut out, "wrapped key", encryption.has_wrapped_key());

    if encryption.is_encrypted() {
        return Ok(out);
    }

    let content = encryption.ciphertext().cloned().unwrap_or_default();
    let signature = Signature::decode(&content)?;
    line(&mut out, "variant", signature.variant());
    line(&mut out, "subject (unverified)", signature.unverified_subject());
    line(&mut out, "signed at", signature.time());
    line(&mut out, "audit", signature.audit().map_or(0, |a| a.len()));

    match signature.proof() {
        SignatureProof::Host { signature } => line(&mut out, "signature bytes", signature.len()),
        SignatureProof::Client { commitment, .. } => {
            line(&mut out, "commitment host", commitment.host());
            line(&mut out, "committed at", commitment.time());
        },
        SignatureProof::Credentials { credentials } => {
            line(&mut out, "credentials", credentials.len());
        },
    }
    Ok(out)
}

/// Write `text` to stdout.
pub fn emit(text: &str) -> io::Result<()> {
    use std::io::Write as _;

    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

fn line(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("{label:>22}: {value}\n"));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cachet_core::{
        AuthContext, CodecConfig, CryptoContext, EnvelopeCodec, MemoryKeyChain,
        test_utils::MockEnv,
    };
    use cachet_crypto::test_utils;
    use cachet_proto::{HostId, Payload, PayloadTag, Timestamp};

    use super::*;

    fn codec() -> EnvelopeCodec<MockEnv> {
        let chain = MemoryKeyChain::new();
        let host = HostId::new("id.example.org");
        chain.host_locally(host, Timestamp::EPOCH, test_utils::host_key(0));
        EnvelopeCodec::new(MockEnv::with_seed(1), CodecConfig::default(), Arc::new(chain)).unwrap()
    }

    fn auth() -> AuthContext {
        AuthContext::host(HostId::new("id.example.org"), Arc::new(test_utils::host_key(0)))
    }

    #[test]
    fn plaintext_envelope_shows_signature() {
        let codec = codec();
        let envelope = codec
            .encode(&Payload::new(PayloadTag(1), &b"x"[..]), &auth(), &CryptoContext::plaintext())
            .unwrap();

        let text = describe(&envelope).unwrap();
        assert!(text.contains("(reply)"));
        assert!(text.contains("host"));
        assert!(text.contains("id.example.org"));
    }

    #[test]
    fn encrypted_envelope_hides_signature() {
        let codec = codec();
        let key = codec.generate_key();
        let envelope = codec
            .encode(
                &Payload::new(PayloadTag(1), &b"x"[..]),
                &auth(),
                &CryptoContext::request(HostId::new("id.example.org"), key),
            )
            .unwrap();

        let text = describe(&envelope).unwrap();
        assert!(text.contains("id.example.org"));
        assert!(!text.contains("variant"));
    }

    #[test]
    fn foreign_bytes_rejected() {
        assert!(describe(b"GET / HTTP/1.1").is_err());
    }
}
