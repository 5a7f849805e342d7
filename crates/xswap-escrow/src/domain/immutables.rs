//! # Escrow Immutables
//!
//! The parameter set fixed at negotiation time and its commitment.
//!
//! The commitment is `keccak256(abi.encode(immutables))`: eight 32-byte
//! words in field order, addresses left-padded. This exact layout is what
//! the deployed escrow contracts hash, so it must not change.

use super::timelocks::Timelocks;
use super::value_objects::{Address, Hash, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Size of the ABI encoding (8 words).
pub const IMMUTABLES_ENCODED_LEN: usize = 8 * 32;

/// Immutable parameters of one escrow instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Immutables {
    /// Off-chain order this escrow settles.
    pub order_hash: Hash,
    /// Hash of the swap secret under the chain's hash function.
    pub hashlock: Hash,
    /// Maker account.
    pub maker: Address,
    /// Taker (resolver) account.
    pub taker: Address,
    /// Escrowed asset; [`Address::NATIVE`] for the chain's native asset.
    pub token: Address,
    /// Principal paid to the redeemer or refunder.
    pub amount: U256,
    /// Native-asset collateral paid to whoever executes the resolution.
    pub safety_deposit: U256,
    /// Packed stage offsets and deployment timestamp.
    pub timelocks: Timelocks,
}

impl Immutables {
    /// Solidity `abi.encode` of the struct.
    pub fn abi_encode(&self) -> [u8; IMMUTABLES_ENCODED_LEN] {
        let mut out = [0u8; IMMUTABLES_ENCODED_LEN];
        out[0..32].copy_from_slice(self.order_hash.as_bytes());
        out[32..64].copy_from_slice(self.hashlock.as_bytes());
        out[64..96].copy_from_slice(&self.maker.to_word());
        out[96..128].copy_from_slice(&self.taker.to_word());
        out[128..160].copy_from_slice(&self.token.to_word());
        self.amount.to_big_endian(&mut out[160..192]);
        self.safety_deposit.to_big_endian(&mut out[192..224]);
        out[224..256].copy_from_slice(&self.timelocks.to_be_bytes());
        out
    }

    /// Commitment used as CREATE2 salt and as the instance self-check.
    pub fn hash(&self) -> Hash {
        Hash::new(Keccak256::digest(self.abi_encode()).into())
    }

    /// Copy stamped with the deployment timestamp.
    #[must_use]
    pub fn with_deployed_at(&self, timestamp: u32) -> Self {
        Self {
            timelocks: self.timelocks.with_deployed_at(timestamp),
            ..*self
        }
    }

    /// Native value that must accompany creation.
    pub fn required_native_value(&self) -> U256 {
        if self.token.is_native() {
            self.safety_deposit.saturating_add(self.amount)
        } else {
            self.safety_deposit
        }
    }
}
