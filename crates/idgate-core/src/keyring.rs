//! Private key ring
//!
//! Per owner the ring keeps one write-once identity key (paired with the
//! owner's meta) and a short most-recent-first list of communication keys
//! (paired with visas). Decryption candidates are memoized and the memo is
//! dropped in the same critical section as every mutation.

use hashbrown::HashMap;
use smallvec::SmallVec;
use std::sync::{Mutex, MutexGuard};

use crate::config::{CoreConfig, DEFAULT_COMMUNICATION_KEY_CAPACITY};
use crate::errors::{CoreError, Result};
use crate::keys::PrivateKey;
use crate::types::Identifier;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use tracing::{debug, error};
    } else {
        use log::{debug, error};
    }
}

type CommunicationKeys = SmallVec<[PrivateKey; DEFAULT_COMMUNICATION_KEY_CAPACITY]>;

#[derive(Debug, Default)]
struct KeyEntry {
    identity_key: Option<PrivateKey>,
    /// Most recent first
    communication_keys: CommunicationKeys,
    decryption_memo: Option<Vec<PrivateKey>>,
}

impl KeyEntry {
    fn decryption_keys(&self) -> Vec<PrivateKey> {
        let mut keys: Vec<PrivateKey> = self
            .communication_keys
            .iter()
            .filter(|key| key.can_decrypt())
            .cloned()
            .collect();
        if let Some(identity_key) = &self.identity_key {
            if identity_key.can_decrypt() && !keys.contains(identity_key) {
                keys.push(identity_key.clone());
            }
        }
        keys
    }
}

// ----------------------------------------------------------------------------
// Key Ring
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct KeyRing {
    capacity: usize,
    entries: Mutex<HashMap<Identifier, KeyEntry>>,
}

impl KeyRing {
    /// Create a ring keeping up to `capacity` communication keys per owner
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(config: &CoreConfig) -> Self {
        Self::new(config.communication_key_capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Identifier, KeyEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Store the identity key for `owner`
    ///
    /// The identity key never changes once set: offering the same key again
    /// is `Ok(false)`, offering a different one is an error.
    pub fn set_identity_key(&self, owner: &Identifier, key: PrivateKey) -> Result<bool> {
        let mut entries = self.lock();
        let entry = entries.entry(owner.clone()).or_default();
        if let Some(existing) = &entry.identity_key {
            if *existing == key {
                return Ok(false);
            }
            error!("Identity key for {} already set, refusing replacement", owner);
            return Err(CoreError::identity_key_conflict(owner));
        }
        entry.identity_key = Some(key);
        entry.decryption_memo = None;
        Ok(true)
    }

    /// Make `key` the current communication key for `owner`
    ///
    /// Returns false when it already is.
    pub fn set_communication_key(&self, owner: &Identifier, key: PrivateKey) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(owner.clone()).or_default();
        let keys = &mut entry.communication_keys;

        match keys.iter().position(|existing| *existing == key) {
            Some(0) => return false,
            Some(index) => {
                keys.remove(index);
            }
            None => keys.truncate(self.capacity - 1),
        }
        keys.insert(0, key);
        entry.decryption_memo = None;
        debug!("Rotated communication key for {} ({} kept)", owner, keys.len());
        true
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn identity_key(&self, owner: &Identifier) -> Option<PrivateKey> {
        self.lock()
            .get(owner)
            .and_then(|entry| entry.identity_key.clone())
    }

    /// Communication keys for `owner`, most recent first
    pub fn communication_keys(&self, owner: &Identifier) -> Vec<PrivateKey> {
        self.lock()
            .get(owner)
            .map(|entry| entry.communication_keys.to_vec())
            .unwrap_or_default()
    }

    /// Keys to try when decrypting a message for `owner`
    pub fn decryption_keys(&self, owner: &Identifier) -> Vec<PrivateKey> {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(owner) else {
            return Vec::new();
        };
        if let Some(memo) = &entry.decryption_memo {
            return memo.clone();
        }
        let keys = entry.decryption_keys();
        entry.decryption_memo = Some(keys.clone());
        keys
    }

    /// Key for signing messages: the current communication key, falling back
    /// to the identity key
    pub fn signing_key(&self, owner: &Identifier) -> Option<PrivateKey> {
        let entries = self.lock();
        let entry = entries.get(owner)?;
        entry
            .communication_keys
            .first()
            .or(entry.identity_key.as_ref())
            .cloned()
    }

    /// Key for signing visa documents
    pub fn visa_signing_key(&self, owner: &Identifier) -> Option<PrivateKey> {
        self.identity_key(owner)
    }

    /// Drop every decryption memo
    ///
    /// Returns the number of owners still tracked.
    pub fn reduce_memory(&self) -> usize {
        let mut entries = self.lock();
        for entry in entries.values_mut() {
            entry.decryption_memo = None;
        }
        entries.len()
    }
}

impl Default for KeyRing {
    fn default() -> Self {
        Self::new(DEFAULT_COMMUNICATION_KEY_CAPACITY)
    }
}
