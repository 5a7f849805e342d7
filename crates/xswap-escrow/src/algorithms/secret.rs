//! # Secret Generation and Verification
//!
//! Each chain hashes the same preimage with its own function: Keccak-256 on
//! the EVM side, SHA-256 (`OP_SHA256`) on the Bitcoin side. A secret is only
//! valid under the scheme of the chain it is presented on.

use crate::domain::{Hash, Secret, SecureSecret};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Hash function binding a secret to a hashlock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashScheme {
    /// EVM escrows.
    Keccak256,
    /// Bitcoin scripts.
    Sha256,
}

impl HashScheme {
    /// Hashlock for a preimage.
    pub fn digest(&self, preimage: &[u8]) -> Hash {
        let out: [u8; 32] = match self {
            HashScheme::Keccak256 => Keccak256::digest(preimage).into(),
            HashScheme::Sha256 => Sha256::digest(preimage).into(),
        };
        Hash::new(out)
    }

    /// Whether `preimage` opens `hashlock` under this scheme.
    pub fn verify(&self, preimage: &Secret, hashlock: &Hash) -> bool {
        self.digest(preimage) == *hashlock
    }
}

/// Fresh swap secret with both hashlocks.
pub struct SecretBundle {
    /// The preimage.
    pub secret: SecureSecret,
    /// Keccak-256 hashlock for EVM legs.
    pub evm_hashlock: Hash,
    /// SHA-256 hashlock for Bitcoin legs.
    pub bitcoin_hashlock: Hash,
}

impl SecretBundle {
    /// Draws a secret and derives both hashlocks.
    pub fn generate() -> Self {
        Self::from_secret(SecureSecret::generate())
    }

    /// Derives both hashlocks for a known secret.
    pub fn from_secret(secret: SecureSecret) -> Self {
        let evm_hashlock = HashScheme::Keccak256.digest(secret.as_bytes());
        let bitcoin_hashlock = HashScheme::Sha256.digest(secret.as_bytes());
        Self {
            secret,
            evm_hashlock,
            bitcoin_hashlock,
        }
    }

    /// Hashlock for a chain scheme.
    pub fn hashlock(&self, scheme: HashScheme) -> Hash {
        match scheme {
            HashScheme::Keccak256 => self.evm_hashlock,
            HashScheme::Sha256 => self.bitcoin_hashlock,
        }
    }
}
