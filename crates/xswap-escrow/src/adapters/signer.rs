//! # secp256k1 Signing Adapters
//!
//! `k256` ECDSA behind the [`BitcoinSigner`] and [`SignatureVerifier`]
//! ports. Signatures are 64-byte compact `r || s` over the spend digest,
//! with RFC 6979 nonces and low-S normalization.

use crate::domain::{EscrowError, PublicKey, ScriptError};
use crate::ports::outbound::{BitcoinSigner, SignatureVerifier};
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};

/// In-process secp256k1 key.
pub struct Secp256k1Signer {
    signing_key: SigningKey,
}

impl Secp256k1Signer {
    /// Generate random key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, EscrowError> {
        let signing_key = SigningKey::from_bytes((&bytes).into())
            .map_err(|e| EscrowError::Chain(format!("invalid secret key: {e}")))?;
        Ok(Self { signing_key })
    }
}

impl std::fmt::Debug for Secp256k1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1Signer")
            .field("public_key", &self.public_key())
            .finish()
    }
}

impl BitcoinSigner for Secp256k1Signer {
    fn public_key(&self) -> PublicKey {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(point.as_bytes());
        PublicKey(bytes)
    }

    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, EscrowError> {
        let sig: Signature = self
            .signing_key
            .try_sign(digest)
            .map_err(|e| ScriptError::Signing(e.to_string()))?;
        Ok(sig.to_bytes().to_vec())
    }
}

/// Stateless secp256k1 verifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, key: &PublicKey, digest: &[u8; 32], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(key.as_bytes()) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(digest, &sig).is_ok()
    }
}
