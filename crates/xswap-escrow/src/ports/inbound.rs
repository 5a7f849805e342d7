//! # Inbound Ports
//!
//! API trait defining what the swap coordinator can do, and the terms a
//! swap is negotiated with.

use crate::domain::{
    Address, ChainKind, EscrowError, Hash, LegLocator, Role, Secret, StageOffsets, SwapRecord,
    U256,
};
use crate::ports::outbound::BitcoinSigner;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Which chain holds the maker's asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwapDirection {
    /// Maker sells EVM tokens for bitcoin.
    EvmToBitcoin,
    /// Maker sells bitcoin for EVM tokens.
    BitcoinToEvm,
}

impl SwapDirection {
    /// Chain hosting the leg with `role`.
    pub fn chain(&self, role: Role) -> ChainKind {
        match (self, role) {
            (SwapDirection::EvmToBitcoin, Role::Source)
            | (SwapDirection::BitcoinToEvm, Role::Destination) => ChainKind::Evm,
            (SwapDirection::EvmToBitcoin, Role::Destination)
            | (SwapDirection::BitcoinToEvm, Role::Source) => ChainKind::Bitcoin,
        }
    }
}

/// One side of a swap, with an identity on each chain.
#[derive(Clone)]
pub struct Party {
    /// EVM account.
    pub account: Address,
    /// Bitcoin key.
    pub signer: Arc<dyn BitcoinSigner>,
    /// Output script receiving this party's bitcoin.
    pub payout_script: Vec<u8>,
}

impl std::fmt::Debug for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Party")
            .field("account", &self.account)
            .field("public_key", &self.signer.public_key())
            .finish()
    }
}

/// Negotiated terms of a swap.
#[derive(Clone, Debug)]
pub struct SwapTerms {
    /// Off-chain order identifier.
    pub order_hash: Hash,
    /// Direction.
    pub direction: SwapDirection,
    /// Order creator; funds the source leg.
    pub maker: Party,
    /// Resolver; funds the destination leg.
    pub taker: Party,
    /// EVM asset.
    pub token: Address,
    /// EVM principal.
    pub evm_amount: U256,
    /// EVM safety deposit.
    pub safety_deposit: U256,
    /// Stage offsets of the EVM leg.
    pub offsets: StageOffsets,
    /// Bitcoin principal.
    pub btc_amount_sats: u64,
    /// Refund locktime of the Bitcoin leg, relative to its funding time.
    pub btc_locktime_offset: u32,
}

/// Swap coordination API - inbound port.
#[async_trait]
pub trait SwapApi: Send + Sync {
    /// Generates the secret and registers the swap.
    async fn initiate(&self, terms: SwapTerms) -> Result<SwapRecord, EscrowError>;

    /// Locks the maker's asset.
    async fn lock_source(&self, id: Uuid) -> Result<LegLocator, EscrowError>;

    /// Locks the taker's asset, checked against the source leg's timing.
    async fn lock_destination(&self, id: Uuid) -> Result<LegLocator, EscrowError>;

    /// Withdraws the destination leg to the maker, revealing the secret.
    async fn claim_destination(&self, id: Uuid) -> Result<Secret, EscrowError>;

    /// Reads the revealed secret on the destination chain and withdraws
    /// the source leg to the taker.
    async fn complete_source(&self, id: Uuid) -> Result<(), EscrowError>;

    /// Cancels a leg back to its funder.
    async fn refund(&self, id: Uuid, role: Role) -> Result<(), EscrowError>;

    /// Current record.
    fn get_swap(&self, id: &Uuid) -> Option<SwapRecord>;
}
