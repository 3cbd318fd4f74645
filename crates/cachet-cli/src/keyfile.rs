//! Host key files.
//!
//! A key file is one CBOR map holding the host identifier, the activation
//! time and the key components as big-endian byte strings. It contains the
//! private exponent; on unix it is written readable by the owner only.

use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    path::Path,
};

use cachet_crypto::{BigUint, CryptoError, PrivateKey};
use cachet_proto::{HostId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use thiserror::Error;

/// Key file failures.
#[derive(Error, Debug)]
pub enum KeyFileError {
    /// File could not be read or written
    #[error("key file I/O: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a CBOR key map
    #[error("malformed key file: {0}")]
    Malformed(String),

    /// Components do not form a valid key
    #[error("invalid key: {0}")]
    Key(#[from] CryptoError),
}

#[derive(Serialize, Deserialize)]
struct Components {
    host: HostId,
    activation: Timestamp,
    modulus: ByteBuf,
    public_exponent: ByteBuf,
    private_exponent: ByteBuf,
    generator: ByteBuf,
}

/// Host key loaded from disk.
pub struct KeyFile {
    /// Host the key belongs to
    pub host: HostId,
    /// Time the key becomes active
    pub activation: Timestamp,
    /// Key pair
    pub key: PrivateKey,
}

impl KeyFile {
    /// Write to `path` with mode `0600`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<(), KeyFileError> {
        let public = self.key.public_key();
        let components = Components {
            host: self.host.clone(),
            activation: self.activation,
            modulus: ByteBuf::from(public.modulus().to_bytes_be()),
            public_exponent: ByteBuf::from(public.exponent().to_bytes_be()),
            private_exponent: ByteBuf::from(self.key.private_exponent().to_bytes_be()),
            generator: ByteBuf::from(public.generator().to_bytes_be()),
        };

        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&components, &mut encoded)
            .map_err(|e| KeyFileError::Malformed(e.to_string()))?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;

        // An existing file keeps its mode through open(); tighten it
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(&encoded)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read and validate a key file.
    pub fn read(path: &Path) -> Result<Self, KeyFileError> {
        let bytes = fs::read(path)?;
        let components: Components = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| KeyFileError::Malformed(e.to_string()))?;

        let key = PrivateKey::from_components(
            BigUint::from_bytes_be(&components.modulus),
            BigUint::from_bytes_be(&components.public_exponent),
            BigUint::from_bytes_be(&components.private_exponent),
            BigUint::from_bytes_be(&components.generator),
        )?;
        Ok(Self { host: components.host, activation: components.activation, key })
    }
}
