//! Host key-chain lookup.
//!
//! A key chain maps `(host, time)` to the host key that was active at that
//! time. Hosts rotate keys by publishing a new entry with a later activation
//! time; older entries stay resolvable so historical signatures and
//! commitments can still be checked.
//!
//! Lookups may block (a real deployment resolves keys over the network). The
//! codec treats any lookup failure as an ordinary signature or encryption
//! error.

#![allow(clippy::expect_used, reason = "lock poisoning is unrecoverable")]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use cachet_crypto::{PrivateKey, PublicKey};
use cachet_proto::{HostId, Timestamp};
use thiserror::Error;

/// Key-chain lookup failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyChainError {
    /// No key has ever been published for this host
    #[error("unknown host: {0}")]
    UnknownHost(HostId),

    /// Host has keys, but none active at the requested time
    #[error("no key for {host} active at {at}")]
    NoActiveKey {
        /// Host looked up
        host: HostId,
        /// Requested time
        at: Timestamp,
    },

    /// Private key requested for a host this process does not run
    #[error("host {0} is not hosted locally")]
    NotLocal(HostId),
}

/// Resolution of host keys by time.
pub trait KeyChain: Send + Sync {
    /// Public key of `host` active at `at`.
    fn public_key(&self, host: &HostId, at: Timestamp) -> Result<Arc<PublicKey>, KeyChainError>;

    /// Private key of locally hosted `host` active at `at`.
    fn private_key(&self, host: &HostId, at: Timestamp) -> Result<Arc<PrivateKey>, KeyChainError>;

    /// True if this process runs `host` and holds its private keys.
    fn is_local(&self, host: &HostId) -> bool;
}

type History<K> = BTreeMap<Timestamp, Arc<K>>;

/// In-memory key chain with per-host rotation histories.
///
/// The key active at `t` is the entry with the latest activation time
/// `<= t`.
#[derive(Debug, Default)]
pub struct MemoryKeyChain {
    public: RwLock<HashMap<HostId, History<PublicKey>>>,
    private: RwLock<HashMap<HostId, History<PrivateKey>>>,
}

impl MemoryKeyChain {
    /// Create an empty key chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `host` activated `key` at `activation`.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn publish(&self, host: HostId, activation: Timestamp, key: PublicKey) {
        self.public
            .write()
            .expect("key chain lock poisoned")
            .entry(host)
            .or_default()
            .insert(activation, Arc::new(key));
    }

    /// Run `host` locally with `key` from `activation`, publishing its
    /// public half.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn host_locally(&self, host: HostId, activation: Timestamp, key: PrivateKey) {
        self.publish(host.clone(), activation, key.public_key().clone());
        self.private
            .write()
            .expect("key chain lock poisoned")
            .entry(host)
            .or_default()
            .insert(activation, Arc::new(key));
    }
}

impl KeyChain for MemoryKeyChain {
    fn public_key(&self, host: &HostId, at: Timestamp) -> Result<Arc<PublicKey>, KeyChainError> {
        let public = self.public.read().expect("key chain lock poisoned");
        active(&public, host, at)
    }

    fn private_key(&self, host: &HostId, at: Timestamp) -> Result<Arc<PrivateKey>, KeyChainError> {
        let private = self.private.read().expect("key chain lock poisoned");
        if !private.contains_key(host) {
            return Err(KeyChainError::NotLocal(host.clone()));
        }
        active(&private, host, at)
    }

    fn is_local(&self, host: &HostId) -> bool {
        self.private.read().expect("key chain lock poisoned").contains_key(host)
    }
}

fn active<K>(
    chains: &HashMap<HostId, History<K>>,
    host: &HostId,
    at: Timestamp,
) -> Result<Arc<K>, KeyChainError> {
    let history = chains.get(host).ok_or_else(|| KeyChainError::UnknownHost(host.clone()))?;
    history
        .range(..=at)
        .next_back()
        .map(|(_, key)| Arc::clone(key))
        .ok_or_else(|| KeyChainError::NoActiveKey { host: host.clone(), at })
}
