//! # Domain Value Objects
//!
//! Immutable value types shared by both legs of a swap.

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export U256 from primitive-types for 256-bit amounts and timelock words
pub use primitive_types::U256;

/// Secret type (32-byte preimage).
pub type Secret = [u8; 32];

// =============================================================================
// ADDRESS (20 bytes)
// =============================================================================

/// A 20-byte EVM account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address (0x0000...0000).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Sentinel token identifier for the chain's native asset.
    pub const NATIVE: Self = Self::ZERO;

    /// Creates an address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an address from a slice. Returns None if wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 20] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Parses a `0x`-prefixed (or bare) hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s.trim_start_matches("0x")).ok()?;
        Self::from_slice(&raw)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Returns true if this token identifier denotes the native asset.
    #[must_use]
    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }

    /// ABI word: the address left-padded with 12 zero bytes.
    #[must_use]
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...")?;
        for byte in &self.0[18..] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl From<Address> for [u8; 20] {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

// =============================================================================
// HASH (32 bytes)
// =============================================================================

/// A 32-byte hash (Keccak-256 on the EVM side, SHA-256 on the Bitcoin side).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The zero hash.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Creates a hash from a 32-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a hash from a slice. Returns None if wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 32] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true if this is the zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...")?;
        for byte in &self.0[28..] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for [u8; 32] {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

// =============================================================================
// PUBLIC KEY (33 bytes, compressed secp256k1)
// =============================================================================

/// Compressed secp256k1 public key identifying a Bitcoin-side party.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "hex_33")] pub [u8; 33]);

impl PublicKey {
    /// Wraps compressed SEC1 bytes. Only the prefix is checked here; curve
    /// membership is the signature verifier's concern.
    #[must_use]
    pub fn from_compressed(bytes: [u8; 33]) -> Option<Self> {
        matches!(bytes[0], 0x02 | 0x03).then_some(Self(bytes))
    }

    /// Creates a key from a slice. Returns None on wrong length or prefix.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 33] = slice.try_into().ok()?;
        Self::from_compressed(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

mod hex_33 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 33], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 33], D::Error> {
        let s = String::deserialize(d)?;
        let raw = hex::decode(s).map_err(serde::de::Error::custom)?;
        raw.as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("public key must be 33 bytes"))
    }
}

// =============================================================================
// OUTPOINT
// =============================================================================

/// Reference to a Bitcoin transaction output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Funding transaction id.
    pub txid: Hash,
    /// Output index.
    pub vout: u32,
}

impl fmt::Debug for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid.0), self.vout)
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

// =============================================================================
// ROLE / CHAIN / NETWORK
// =============================================================================

/// Which leg of the swap an escrow holds.
///
/// The source leg carries the maker's asset (4 stages), the destination leg
/// carries the taker's asset (3 stages, no public cancellation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Maker-funded leg.
    Source,
    /// Taker-funded leg.
    Destination,
}

impl Role {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Destination => "destination",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain family hosting a leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainKind {
    /// Bitcoin (script-predicate HTLC).
    Bitcoin,
    /// EVM-compatible chain (account-model escrow).
    Evm,
}

/// Bitcoin network, selecting address encodings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitcoinNetwork {
    /// Bitcoin mainnet.
    Mainnet,
    /// Testnet3 / testnet4.
    Testnet,
    /// Signet.
    Signet,
    /// Local regtest.
    #[default]
    Regtest,
}

impl BitcoinNetwork {
    /// Bech32 human-readable part for segwit addresses.
    pub fn bech32_hrp(&self) -> &'static str {
        match self {
            BitcoinNetwork::Mainnet => "bc",
            BitcoinNetwork::Testnet | BitcoinNetwork::Signet => "tb",
            BitcoinNetwork::Regtest => "bcrt",
        }
    }

    /// Base58 version byte for P2SH addresses.
    pub fn p2sh_version(&self) -> u8 {
        match self {
            BitcoinNetwork::Mainnet => 0x05,
            _ => 0xc4,
        }
    }

    /// Parses `mainnet`, `testnet`, `signet` or `regtest`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Some(Self::Mainnet),
            "testnet" => Some(Self::Testnet),
            "signet" => Some(Self::Signet),
            "regtest" => Some(Self::Regtest),
            _ => None,
        }
    }
}
