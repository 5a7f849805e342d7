//! # Secure Secret Type
//!
//! The swap preimage. Until the first withdrawal reveals it on chain it is
//! the only thing standing between the counterparty and both legs, so it is
//! zeroed on drop and never printed.

use super::value_objects::Secret;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte swap secret that zeroizes on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureSecret {
    inner: Secret,
}

impl SecureSecret {
    /// Wraps existing secret bytes.
    pub fn new(bytes: Secret) -> Self {
        Self { inner: bytes }
    }

    /// Draws a fresh secret from the thread CSPRNG.
    pub fn generate() -> Self {
        let mut inner = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut inner);
        Self { inner }
    }

    /// Copies from a slice; `None` unless exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let inner: Secret = slice.try_into().ok()?;
        Some(Self { inner })
    }

    /// Borrow the secret bytes. Do not keep the reference around.
    pub fn as_bytes(&self) -> &Secret {
        &self.inner
    }

    /// Copy of the secret bytes, for call sites that must own them.
    pub fn expose(&self) -> Secret {
        self.inner
    }
}

impl std::fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecureSecret(***)")
    }
}

impl Serialize for SecureSecret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.inner))
    }
}

impl<'de> Deserialize<'de> for SecureSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).ok_or_else(|| serde::de::Error::custom("invalid secret length"))
    }
}
