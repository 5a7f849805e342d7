//! In-memory Bitcoin Chain
//!
//! Implements the `BitcoinHtlcChain` port over a UTXO set. Spends are
//! judged with the HTLC predicate evaluator against the chain clock's
//! median time past; a spent output is gone, so replays fail.

use crate::algorithms::bitcoin_script::{evaluate, spend_digest, SpendContext, SpendPath};
use crate::domain::{EscrowError, Hash, OutPoint};
use crate::metrics;
use crate::ports::outbound::{BitcoinHtlcChain, Clock, SignatureVerifier, SpendTransaction};
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An unspent output.
#[derive(Clone, Debug, PartialEq, Eq)]
struct TxOut {
    script_pubkey: Vec<u8>,
    value_sats: u64,
}

#[derive(Default)]
struct ChainState {
    utxos: HashMap<OutPoint, TxOut>,
    /// Spent outpoint -> witness that spent it.
    spent: HashMap<OutPoint, Vec<Vec<u8>>>,
    tx_count: u64,
}

impl ChainState {
    fn next_txid(&mut self, payload: &[u8]) -> Hash {
        self.tx_count += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.tx_count.to_le_bytes());
        hasher.update(payload);
        Hash::new(Sha256::digest(hasher.finalize()).into())
    }
}

/// In-memory UTXO chain for testing and simulation.
pub struct InMemoryBitcoinChain {
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    state: RwLock<ChainState>,
}

impl InMemoryBitcoinChain {
    /// Create a chain whose median time past follows `clock`.
    pub fn new(verifier: Arc<dyn SignatureVerifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            verifier,
            clock,
            state: RwLock::new(ChainState::default()),
        }
    }

    /// Total unspent value paying to `script_pubkey`.
    pub fn balance_of(&self, script_pubkey: &[u8]) -> u64 {
        self.state
            .read()
            .utxos
            .values()
            .filter(|out| out.script_pubkey == script_pubkey)
            .map(|out| out.value_sats)
            .sum()
    }

    /// Whether `outpoint` is still unspent.
    pub fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        self.state.read().utxos.contains_key(outpoint)
    }

    fn apply_spend(&self, tx: SpendTransaction) -> Result<Hash, EscrowError> {
        let mut state = self.state.write();
        let output = state
            .utxos
            .get(&tx.outpoint)
            .cloned()
            .ok_or_else(|| EscrowError::UtxoNotFound(tx.outpoint.to_string()))?;

        let ctx = SpendContext {
            sighash: spend_digest(
                &tx.outpoint.txid,
                tx.outpoint.vout,
                output.value_sats,
                &tx.recipient_script,
                tx.tx_lock_time,
            ),
            tx_lock_time: tx.tx_lock_time,
            median_time_past: self.clock.now(),
        };
        let path = evaluate(&tx.witness, &output.script_pubkey, &ctx, self.verifier.as_ref())?;

        let txid = state.next_txid(&tx.outpoint.txid.0);
        state.utxos.remove(&tx.outpoint);
        state.utxos.insert(
            OutPoint { txid, vout: 0 },
            TxOut {
                script_pubkey: tx.recipient_script,
                value_sats: output.value_sats,
            },
        );
        state.spent.insert(tx.outpoint, tx.witness);

        match path {
            SpendPath::Redeem { .. } => {
                info!("[xswap] HTLC {} redeemed in {}", tx.outpoint, txid)
            }
            SpendPath::Refund => info!("[xswap] HTLC {} refunded in {}", tx.outpoint, txid),
        }
        Ok(txid)
    }
}

#[async_trait]
impl BitcoinHtlcChain for InMemoryBitcoinChain {
    async fn fund(&self, script_pubkey: Vec<u8>, value_sats: u64) -> Result<OutPoint, EscrowError> {
        let mut state = self.state.write();
        let txid = state.next_txid(&script_pubkey);
        let outpoint = OutPoint { txid, vout: 0 };
        state.utxos.insert(
            outpoint,
            TxOut {
                script_pubkey,
                value_sats,
            },
        );
        info!("[xswap] Funded {} with {} sats", outpoint, value_sats);
        Ok(outpoint)
    }

    async fn spend(&self, tx: SpendTransaction) -> Result<Hash, EscrowError> {
        debug!(
            "[xswap] Spending {} (lock_time={}, witness items={})",
            tx.outpoint,
            tx.tx_lock_time,
            tx.witness.len()
        );
        self.apply_spend(tx).map_err(|err| {
            metrics::record_rejection(err.class());
            warn!("[xswap] Spend rejected: {}", err);
            err
        })
    }

    async fn spend_digest(
        &self,
        outpoint: OutPoint,
        recipient_script: &[u8],
        tx_lock_time: u32,
    ) -> Result<[u8; 32], EscrowError> {
        let state = self.state.read();
        let output = state
            .utxos
            .get(&outpoint)
            .ok_or_else(|| EscrowError::UtxoNotFound(outpoint.to_string()))?;
        Ok(spend_digest(
            &outpoint.txid,
            outpoint.vout,
            output.value_sats,
            recipient_script,
            tx_lock_time,
        ))
    }

    async fn spending_witness(
        &self,
        outpoint: OutPoint,
    ) -> Result<Option<Vec<Vec<u8>>>, EscrowError> {
        Ok(self.state.read().spent.get(&outpoint).cloned())
    }

    async fn median_time_past(&self) -> Result<u64, EscrowError> {
        Ok(self.clock.now())
    }
}
