//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits: in-memory chains for both legs,
//! secp256k1 signing and clocks.

mod bitcoin_chain;
mod clock;
mod evm_factory;
mod signer;

pub use bitcoin_chain::InMemoryBitcoinChain;
pub use clock::{ManualClock, SystemClock};
pub use evm_factory::InMemoryEscrowFactory;
pub use signer::{Secp256k1Signer, Secp256k1Verifier};
