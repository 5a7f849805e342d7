//! # Outbound Ports
//!
//! Traits for the chains, signing backends and clock the escrow core
//! depends on. Chain ports are async; crypto and clock are synchronous.

use crate::algorithms::state_machine::TransitionRequest;
use crate::domain::{
    Address, EscrowError, EscrowInstance, Hash, Immutables, OutPoint, PublicKey, Secret,
    Settlement, Transfer, U256,
};
use async_trait::async_trait;

/// EVM escrow factory and ledger - outbound port.
///
/// Creation stamps the factory's current block time into the timelocks.
#[async_trait]
pub trait EvmEscrowChain: Send + Sync {
    /// Deploys a source escrow funded by `funder`.
    async fn create_source_escrow(
        &self,
        funder: Address,
        immutables: Immutables,
        value: U256,
    ) -> Result<EscrowInstance, EscrowError>;

    /// Deploys a destination escrow funded by `funder`, bound to the
    /// observed source cancellation time.
    async fn create_destination_escrow(
        &self,
        funder: Address,
        immutables: Immutables,
        src_cancellation_timestamp: u64,
        value: U256,
    ) -> Result<EscrowInstance, EscrowError>;

    /// Executes a resolution transition.
    async fn execute(
        &self,
        escrow: Address,
        immutables: &Immutables,
        request: TransitionRequest,
    ) -> Result<Settlement, EscrowError>;

    /// Emergency sweep to the taker.
    async fn rescue_funds(
        &self,
        escrow: Address,
        immutables: &Immutables,
        caller: Address,
        token: Address,
        amount: U256,
    ) -> Result<Transfer, EscrowError>;

    /// Secret revealed by a withdrawal of `escrow`, if any.
    async fn revealed_secret(&self, escrow: Address) -> Result<Option<Secret>, EscrowError>;

    /// Instance lookup.
    async fn escrow(&self, address: Address) -> Result<Option<EscrowInstance>, EscrowError>;
}

/// A transaction spending one HTLC output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendTransaction {
    /// Output being spent.
    pub outpoint: OutPoint,
    /// Output script receiving the funds.
    pub recipient_script: Vec<u8>,
    /// nLockTime.
    pub tx_lock_time: u32,
    /// Witness stack, witness script last.
    pub witness: Vec<Vec<u8>>,
}

/// Bitcoin chain holding HTLC outputs - outbound port.
#[async_trait]
pub trait BitcoinHtlcChain: Send + Sync {
    /// Creates an output paying `value_sats` to `script_pubkey`.
    async fn fund(&self, script_pubkey: Vec<u8>, value_sats: u64) -> Result<OutPoint, EscrowError>;

    /// Broadcasts a spend. The chain checks the witness against the output.
    async fn spend(&self, tx: SpendTransaction) -> Result<Hash, EscrowError>;

    /// Digest a spend of `outpoint` must sign.
    async fn spend_digest(
        &self,
        outpoint: OutPoint,
        recipient_script: &[u8],
        tx_lock_time: u32,
    ) -> Result<[u8; 32], EscrowError>;

    /// Witness of the transaction that spent `outpoint`, once spent.
    async fn spending_witness(
        &self,
        outpoint: OutPoint,
    ) -> Result<Option<Vec<Vec<u8>>>, EscrowError>;

    /// Median time past of the chain tip.
    async fn median_time_past(&self) -> Result<u64, EscrowError>;
}

/// Signature verification - outbound port.
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` by `key` is valid over `digest`.
    fn verify(&self, key: &PublicKey, digest: &[u8; 32], signature: &[u8]) -> bool;
}

/// Bitcoin-side signing key - outbound port.
pub trait BitcoinSigner: Send + Sync {
    /// Compressed public key.
    fn public_key(&self) -> PublicKey;

    /// Signs a spend digest.
    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, EscrowError>;
}

/// Time source - outbound port.
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}
