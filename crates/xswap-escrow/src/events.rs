//! # Escrow Events
//!
//! What an off-chain watcher needs to locate and follow both legs: the
//! deployed address, the hashlock and the parties.

use crate::algorithms::guards::Transition;
use crate::domain::{Address, Hash, Role, Secret, U256};
use serde::{Deserialize, Serialize};

/// Events emitted by the escrow factory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEvent {
    /// New escrow deployed and funded.
    EscrowCreated {
        /// Deterministic address.
        address: Address,
        /// Leg.
        role: Role,
        /// Hashlock from the immutables.
        hashlock: Hash,
        /// Maker.
        maker: Address,
        /// Taker.
        taker: Address,
        /// Stamped deployment timestamp.
        deployed_at: u32,
    },
    /// Escrow withdrawn; the secret is public from here on.
    EscrowWithdrawn {
        /// Escrow address.
        address: Address,
        /// Withdraw or public withdraw.
        transition: Transition,
        /// Revealed preimage.
        secret: Secret,
        /// Principal recipient.
        recipient: Address,
        /// Executor, paid the safety deposit.
        caller: Address,
    },
    /// Escrow cancelled.
    EscrowCancelled {
        /// Escrow address.
        address: Address,
        /// Cancel or public cancel.
        transition: Transition,
        /// Principal recipient.
        recipient: Address,
        /// Executor, paid the safety deposit.
        caller: Address,
    },
    /// Assets swept by the taker after the rescue delay.
    FundsRescued {
        /// Escrow address.
        address: Address,
        /// Asset.
        token: Address,
        /// Amount.
        amount: U256,
    },
}

impl EscrowEvent {
    /// Address of the escrow the event concerns.
    pub fn escrow(&self) -> Address {
        match self {
            EscrowEvent::EscrowCreated { address, .. }
            | EscrowEvent::EscrowWithdrawn { address, .. }
            | EscrowEvent::EscrowCancelled { address, .. }
            | EscrowEvent::FundsRescued { address, .. } => *address,
        }
    }
}
