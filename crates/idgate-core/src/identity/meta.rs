//! Meta: the immutable public-key record bound to an identifier

use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;
use crate::types::Identifier;

/// Immutable cryptographic record binding a public key to one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Identity public key (paired to the owner's identity private key)
    public_key: PublicKey,
    /// Seed, equal to the identifier's name when present
    seed: Option<String>,
    /// Signature of the seed by the identity key
    fingerprint: Option<Vec<u8>>,
}

impl Meta {
    /// Create a meta without seed (address-only identifiers)
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            seed: None,
            fingerprint: None,
        }
    }

    /// Create a meta with seed and its signature
    pub fn with_seed<S: Into<String>>(public_key: PublicKey, seed: S, fingerprint: Vec<u8>) -> Self {
        Self {
            public_key,
            seed: Some(seed.into()),
            fingerprint: Some(fingerprint),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn seed(&self) -> Option<&str> {
        self.seed.as_deref()
    }

    pub fn fingerprint(&self) -> Option<&[u8]> {
        self.fingerprint.as_deref()
    }

    /// Structural validity: a seed must come with a non-empty fingerprint
    pub fn is_valid(&self) -> bool {
        match (&self.seed, &self.fingerprint) {
            (Some(_), Some(fingerprint)) => !fingerprint.is_empty(),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Whether this meta may belong to `id`
    ///
    /// Compares the seed with the identifier's name. Deriving the address
    /// from the key is the crypto library's job and happens before a meta
    /// reaches this core.
    pub fn matches(&self, id: &Identifier) -> bool {
        self.is_valid() && self.seed() == id.name()
    }
}
