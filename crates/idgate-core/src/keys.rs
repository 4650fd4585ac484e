//! Key material handles
//!
//! Keys are opaque blobs tagged with their algorithm. Generating, signing and
//! encrypting belong to the crypto library; this core only needs to know what
//! a key can be used for and whether two keys are the same.

use core::fmt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ----------------------------------------------------------------------------
// Algorithms
// ----------------------------------------------------------------------------

/// Asymmetric key algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA: signs and encrypts
    Rsa,
    /// ECDSA over secp256k1: signs only
    Ecc,
    /// Ed25519: signs only
    Ed25519,
    /// X25519: key agreement only
    X25519,
}

impl KeyAlgorithm {
    /// Whether keys of this algorithm produce or check signatures
    pub fn supports_signing(self) -> bool {
        !matches!(self, KeyAlgorithm::X25519)
    }

    /// Whether keys of this algorithm can encrypt / decrypt message keys
    pub fn supports_encryption(self) -> bool {
        matches!(self, KeyAlgorithm::Rsa | KeyAlgorithm::X25519)
    }
}

/// What a resolved public key is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Encrypting an outbound message key for the receiver
    Encryption,
    /// Verifying an inbound message signature from the sender
    Verification,
}

/// SHA-256 fingerprint of raw key data
pub fn key_fingerprint(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&hasher.finalize());
    fingerprint
}

// ----------------------------------------------------------------------------
// Public Key
// ----------------------------------------------------------------------------

/// Public key as carried by meta and visa documents
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    data: Vec<u8>,
}

impl PublicKey {
    pub fn new(algorithm: KeyAlgorithm, data: Vec<u8>) -> Self {
        Self { algorithm, data }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn can_verify(&self) -> bool {
        self.algorithm.supports_signing()
    }

    pub fn can_encrypt(&self) -> bool {
        self.algorithm.supports_encryption()
    }

    /// Whether this key may serve the given purpose
    pub fn is_usable_for(&self, purpose: KeyPurpose) -> bool {
        match purpose {
            KeyPurpose::Encryption => self.can_encrypt(),
            KeyPurpose::Verification => self.can_verify(),
        }
    }

    pub fn fingerprint(&self) -> [u8; 32] {
        key_fingerprint(&self.data)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Private Key
// ----------------------------------------------------------------------------

/// Private key held in the local key ring
///
/// `Debug` prints a fingerprint, never the key material.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrivateKey {
    algorithm: KeyAlgorithm,
    data: Vec<u8>,
}

impl PrivateKey {
    pub fn new(algorithm: KeyAlgorithm, data: Vec<u8>) -> Self {
        Self { algorithm, data }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn can_sign(&self) -> bool {
        self.algorithm.supports_signing()
    }

    pub fn can_decrypt(&self) -> bool {
        self.algorithm.supports_encryption()
    }

    pub fn fingerprint(&self) -> [u8; 32] {
        key_fingerprint(&self.data)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fingerprint = self.fingerprint();
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &hex::encode(&fingerprint[..8]))
            .finish()
    }
}
