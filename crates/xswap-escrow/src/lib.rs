//! # XSwap Escrow
//!
//! Trustless Bitcoin <-> EVM atomic swaps using hash time-locked escrows.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Lock the maker's asset on one chain and the taker's on the other under
//! the same secret. Withdrawing the destination leg reveals the secret,
//! which then unlocks the source leg; if nobody withdraws, staged
//! timelocks return both assets.
//!
//! - Packed 7-stage timelock word with the deployment timestamp
//! - Keccak-256 commitment over the ABI-encoded immutables, used as CREATE2 salt
//! - One guard table evaluated by the EVM state machine and compiled into
//!   the Bitcoin redeem script
//! - Sequencer ensuring the destination leg expires before the source leg
//!
//! ## Safety Properties
//!
//! | Property | Enforcement |
//! |----------|-------------|
//! | One-shot resolution | Terminal escrow states, spent UTXOs |
//! | Commitment binding | Every call re-derives the escrow address |
//! | Hashlocks | Keccak-256 on EVM, SHA-256 on Bitcoin |
//! | Cross-chain ordering | `DstCancellation < SrcCancellation` at creation |
//! | Fund safety | No transfer before every check passed |
//!
//! ## Module Structure
//!
//! ```text
//! xswap-escrow/
//! ├── domain/          # Timelocks, Immutables, entities, errors
//! ├── algorithms/      # Guards, state machine, script, sequencer
//! ├── ports/           # SwapApi, EvmEscrowChain, BitcoinHtlcChain
//! ├── adapters/        # In-memory chains, k256 signer, clocks
//! └── service.rs       # SwapCoordinator
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports
pub use algorithms::{
    authorize, derive_address, validate, BitcoinHtlc, HashScheme, HtlcParams, SecretBundle,
    Transition, TransitionRequest, GUARD_TABLE,
};
pub use config::EscrowConfig;
pub use domain::{
    Address, ChainKind, ErrorClass, EscrowError, EscrowInstance, EscrowState, Hash, Immutables,
    LegLocator, OutPoint, PublicKey, Role, ScriptError, Secret, SecureSecret, Settlement, Stage,
    StageOffsets, SwapRecord, SwapState, Timelocks, Transfer, U256,
};
pub use events::EscrowEvent;
pub use ports::{
    BitcoinHtlcChain, BitcoinSigner, Clock, EvmEscrowChain, Party, SignatureVerifier,
    SpendTransaction, SwapApi, SwapDirection, SwapTerms,
};
pub use service::SwapCoordinator;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
