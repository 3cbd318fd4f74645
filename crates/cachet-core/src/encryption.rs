//! Encryption layer (outermost).
//!
//! Hybrid encryption of the encoded signature tuple. A request from a client
//! to host `h` carries a fresh symmetric key wrapped under `h`'s public key
//! active at the envelope time; the content is encrypted under that key with
//! XChaCha20-Poly1305. A reply from the host carries no wrapped key: the
//! client decrypts it with the key it generated for the request.
//!
//! # Field presence
//!
//! | recipient | wrapped key | iv | ciphertext | meaning |
//! |---|---|---|---|---|
//! | `Some` | `Some` | `Some` | `Some` | encrypted request |
//! | `None` | `None` | `Some` | `Some` | encrypted reply |
//! | any | `None` | `None` | any | plaintext content |
//!
//! A wrapped key without a recipient, or an IV without ciphertext, is
//! rejected at decode time.
//!
//! The envelope time and recipient travel in the clear but are bound to the
//! ciphertext as associated data.

use std::fmt;

use bytes::Bytes;
use cachet_crypto::{IV_SIZE, Iv, KeyCache, SYMMETRIC_KEY_SIZE, SymmetricKey, cipher};
use cachet_proto::{
    HostId, Timestamp,
    wire::{self, Tag},
};
use serde_bytes::ByteBuf;
use zeroize::Zeroize;

use crate::{
    env::Environment,
    error::{EnvelopeError, Layer},
    keychain::KeyChain,
};

type EncryptionFields =
    (Timestamp, Option<HostId>, Option<ByteBuf>, Option<ByteBuf>, Option<ByteBuf>);

/// Sender-side encryption choices.
#[derive(Debug, Clone, Default)]
pub struct CryptoContext {
    recipient: Option<HostId>,
    key: Option<SymmetricKey>,
}

impl CryptoContext {
    /// Client request to `recipient`, encrypted under `key`.
    pub fn request(recipient: HostId, key: SymmetricKey) -> Self {
        Self { recipient: Some(recipient), key: Some(key) }
    }

    /// Host reply encrypted under the request's session `key`.
    pub fn reply(key: SymmetricKey) -> Self {
        Self { recipient: None, key: Some(key) }
    }

    /// Unencrypted content (host-to-client control messages).
    pub fn plaintext() -> Self {
        Self::default()
    }

    /// Addressed host, if any.
    pub fn recipient(&self) -> Option<&HostId> {
        self.recipient.as_ref()
    }

    /// Session key, if any.
    pub fn key(&self) -> Option<&SymmetricKey> {
        self.key.as_ref()
    }
}

/// Receiver-side decryption context.
#[derive(Debug, Clone, Default)]
pub struct DecryptionContext {
    reply_key: Option<SymmetricKey>,
}

impl DecryptionContext {
    /// Host receiving requests: keys come from the envelope itself.
    pub fn host() -> Self {
        Self::default()
    }

    /// Client receiving the reply to a request sent under `key`.
    pub fn reply(key: SymmetricKey) -> Self {
        Self { reply_key: Some(key) }
    }

    /// Key expected on a reply, if any.
    pub fn reply_key(&self) -> Option<&SymmetricKey> {
        self.reply_key.as_ref()
    }
}

/// Decoded Encryption tuple.
#[derive(Clone, PartialEq, Eq)]
pub struct Encryption {
    time: Timestamp,
    recipient: Option<HostId>,
    encrypted_key: Option<Bytes>,
    iv: Option<Iv>,
    ciphertext: Option<Bytes>,
}

impl Encryption {
    /// Encrypt `content` as described by `ctx`, stamping it with `time`.
    ///
    /// # Errors
    ///
    /// - `Encryption` if the recipient's key cannot be resolved at `time`
    ///   or cannot wrap the session key
    pub fn wrap<E: Environment>(
        content: Bytes,
        ctx: &CryptoContext,
        time: Timestamp,
        keychain: &dyn KeyChain,
        cache: &KeyCache,
        env: &E,
    ) -> Result<Self, EnvelopeError> {
        let encrypted_key = match (&ctx.recipient, &ctx.key) {
            (Some(recipient), Some(key)) => {
                let public = keychain.public_key(recipient, time).map_err(|e| {
                    EnvelopeError::encryption(format!("cannot resolve recipient key: {e}"))
                })?;
                let wrapped = cache.encrypt_key(&public, key).map_err(EnvelopeError::encryption)?;
                Some(Bytes::from(wrapped))
            },
            _ => None,
        };

        let (iv, ciphertext) = match &ctx.key {
            Some(key) if !content.is_empty() => {
                let mut iv = [0u8; IV_SIZE];
                env.random_bytes(&mut iv);
                let iv = Iv::from_bytes(iv);
                let aad = associated_data(time, ctx.recipient.as_ref())?;
                let ciphertext = cipher::encrypt(&content, &aad, key, &iv);
                (Some(iv), Some(Bytes::from(ciphertext)))
            },
            _ => (None, (!content.is_empty()).then_some(content)),
        };

        Ok(Self { time, recipient: ctx.recipient.clone(), encrypted_key, iv, ciphertext })
    }

    /// Recover the content and the session key it was protected with.
    ///
    /// The session key is the unwrapped request key on a host, or the
    /// caller's reply key on a client; hosts reply under it.
    ///
    /// # Errors
    ///
    /// - `Encoding { layer: Encryption }` if the envelope is addressed to a
    ///   host this process does not run
    /// - `Encryption` if the private key cannot be resolved, the wrapped key
    ///   does not unwrap, no key is available for encrypted content, or the
    ///   content (with the time and recipient) fails to authenticate
    pub fn unwrap(
        &self,
        ctx: &DecryptionContext,
        keychain: &dyn KeyChain,
        cache: &KeyCache,
    ) -> Result<(Bytes, Option<SymmetricKey>), EnvelopeError> {
        let session_key = match &self.recipient {
            Some(host) => {
                if !keychain.is_local(host) {
                    return Err(EnvelopeError::encoding(
                        Layer::Encryption,
                        format!("envelope addressed to {host}, which is not hosted here"),
                    ));
                }
                match &self.encrypted_key {
                    Some(wrapped) => {
                        let private = keychain.private_key(host, self.time).map_err(|e| {
                            EnvelopeError::encryption(format!("cannot resolve private key: {e}"))
                        })?;
                        let key = cache
                            .decrypt_key(&private, wrapped)
                            .map_err(EnvelopeError::encryption)?;
                        tracing::trace!(%host, "unwrapped session key");
                        Some(key)
                    },
                    None => None,
                }
            },
            None => ctx.reply_key.clone(),
        };

        let content = match (&self.iv, &self.ciphertext) {
            (Some(iv), Some(ciphertext)) => {
                let Some(key) = &session_key else {
                    return Err(EnvelopeError::encryption(
                        "a symmetric key is needed to decrypt the response",
                    ));
                };
                let aad = associated_data(self.time, self.recipient.as_ref())?;
                let plaintext = cipher::decrypt(ciphertext, &aad, key, iv)
                    .map_err(EnvelopeError::encryption)?;
                Bytes::from(plaintext)
            },
            (_, ciphertext) => ciphertext.clone().unwrap_or_default(),
        };

        Ok((content, session_key))
    }

    /// Envelope time; selects the recipient key.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Addressed host, or `None` for a reply.
    pub fn recipient(&self) -> Option<&HostId> {
        self.recipient.as_ref()
    }

    /// True if the content is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.iv.is_some()
    }

    /// True if a wrapped session key is carried.
    pub fn has_wrapped_key(&self) -> bool {
        self.encrypted_key.is_some()
    }

    /// Content bytes as carried: ciphertext if encrypted, else plaintext.
    pub fn ciphertext(&self) -> Option<&Bytes> {
        self.ciphertext.as_ref()
    }

    /// Encode as an Encryption tuple.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let to_buf = |bytes: &Bytes| ByteBuf::from(bytes.to_vec());
        let fields: EncryptionFields = (
            self.time,
            self.recipient.clone(),
            self.encrypted_key.as_ref().map(to_buf),
            self.iv.map(|iv| ByteBuf::from(iv.as_bytes().to_vec())),
            self.ciphertext.as_ref().map(to_buf),
        );
        wire::encode_tagged(Tag::Encryption, &fields)
            .map_err(|e| EnvelopeError::encoding(Layer::Encryption, e))
    }

    /// Decode an Encryption tuple and check field presence.
    ///
    /// # Errors
    ///
    /// - `Encoding { layer: Encryption }` on a malformed tuple, an IV of the
    ///   wrong length, an IV without ciphertext, or a wrapped key without a
    ///   recipient
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let (time, recipient, encrypted_key, iv, ciphertext): EncryptionFields =
            wire::decode_tagged(Tag::Encryption, bytes).map_err(malformed)?;

        if encrypted_key.is_some() && recipient.is_none() {
            return Err(malformed("wrapped key without recipient"));
        }
        if iv.is_some() && ciphertext.is_none() {
            return Err(malformed("initialisation vector without ciphertext"));
        }
        let iv = iv.map(|iv| Iv::from_slice(&iv)).transpose().map_err(malformed)?;

        Ok(Self {
            time,
            recipient,
            encrypted_key: encrypted_key.map(|k| Bytes::from(k.into_vec())),
            iv,
            ciphertext: ciphertext.map(|c| Bytes::from(c.into_vec())),
        })
    }
}

impl fmt::Debug for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryption")
            .field("time", &self.time)
            .field("recipient", &self.recipient)
            .field("wrapped_key", &self.encrypted_key.as_ref().map(Bytes::len))
            .field("encrypted", &self.iv.is_some())
            .field("content_len", &self.ciphertext.as_ref().map_or(0, Bytes::len))
            .finish()
    }
}

/// Draw a fresh session key.
pub fn session_key<E: Environment>(env: &E) -> SymmetricKey {
    let mut bytes = [0u8; SYMMETRIC_KEY_SIZE];
    env.random_bytes(&mut bytes);
    let key = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

fn associated_data(time: Timestamp, recipient: Option<&HostId>) -> Result<Vec<u8>, EnvelopeError> {
    wire::encode_tagged(Tag::Encryption, &(time, recipient)).map_err(malformed)
}

fn malformed(reason: impl fmt::Display) -> EnvelopeError {
    EnvelopeError::encoding(Layer::Encryption, reason)
}
