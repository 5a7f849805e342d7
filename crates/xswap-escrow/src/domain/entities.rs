//! # Domain Entities
//!
//! Escrow instances, the transfers a resolution authorizes, and the
//! coordinator's per-swap record.

use super::errors::EscrowError;
use super::value_objects::{Address, ChainKind, Hash, OutPoint, Role, Secret, U256};
use crate::algorithms::guards::Transition;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ESCROW INSTANCE
// =============================================================================

/// Lifecycle of one escrow instance.
///
/// A single-shot machine: `Deployed` moves to exactly one terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowState {
    /// Funded, stage clock running.
    #[default]
    Deployed,
    /// Resolved by the taker with the secret.
    Withdrawn,
    /// Resolved by a third party with the secret.
    PubliclyWithdrawn,
    /// Refunded by the taker.
    Cancelled,
    /// Refunded by a third party.
    PubliclyCancelled,
}

impl EscrowState {
    /// Terminal state reached by a transition.
    pub fn after(transition: Transition) -> Self {
        match transition {
            Transition::Withdraw => Self::Withdrawn,
            Transition::PublicWithdraw => Self::PubliclyWithdrawn,
            Transition::Cancel => Self::Cancelled,
            Transition::PublicCancel => Self::PubliclyCancelled,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Deployed)
    }
}

/// A deployed escrow as tracked by the factory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowInstance {
    /// Deterministic address.
    pub address: Address,
    /// Leg held by this escrow.
    pub role: Role,
    /// Deploying factory.
    pub factory: Address,
    /// Proxied implementation.
    pub implementation: Address,
    /// Current state.
    pub state: EscrowState,
    /// Creation timestamp stamped into the timelocks.
    pub deployed_at: u32,
}

impl EscrowInstance {
    /// Marks the instance consumed. Fails if it already was.
    pub fn resolve(&mut self, transition: Transition) -> Result<(), EscrowError> {
        if self.state.is_terminal() {
            return Err(EscrowError::AlreadyResolved {
                address: self.address,
            });
        }
        self.state = EscrowState::after(transition);
        Ok(())
    }
}

// =============================================================================
// SETTLEMENT
// =============================================================================

/// One asset movement out of an escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Recipient.
    pub to: Address,
    /// Asset; [`Address::NATIVE`] for the native asset.
    pub token: Address,
    /// Amount.
    pub amount: U256,
}

/// Transfers authorized by a successful transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Escrow being resolved.
    pub escrow: Address,
    /// Transition that was authorized.
    pub transition: Transition,
    /// Principal to the redeemer or refunder.
    pub principal: Transfer,
    /// Safety deposit to the caller.
    pub deposit: Transfer,
    /// Secret revealed by a withdrawal.
    pub secret: Option<Secret>,
}

// =============================================================================
// SWAP RECORD
// =============================================================================

/// Progress of a coordinated swap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapState {
    /// Terms agreed, secret generated.
    #[default]
    Initiated,
    /// Maker-funded leg locked.
    SourceLocked,
    /// Taker-funded leg locked.
    DestinationLocked,
    /// Destination leg withdrawn, secret public.
    DestinationClaimed,
    /// Source leg withdrawn with the replayed secret.
    Completed,
    /// A leg was refunded.
    Refunded,
}

impl SwapState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: SwapState) -> bool {
        match (self, next) {
            (Self::Initiated, Self::SourceLocked) => true,
            (Self::SourceLocked, Self::DestinationLocked) => true,
            (Self::DestinationLocked, Self::DestinationClaimed) => true,
            (Self::DestinationClaimed, Self::Completed) => true,
            (from, Self::Refunded) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded)
    }
}

/// Where a locked leg lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegLocator {
    /// EVM escrow clone.
    Evm(Address),
    /// Bitcoin HTLC output.
    Bitcoin(OutPoint),
}

/// Coordinator's view of one swap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapRecord {
    /// Correlation id for logs.
    pub id: Uuid,
    /// Off-chain order identifier.
    pub order_hash: Hash,
    /// Chain of the maker-funded leg.
    pub source_chain: ChainKind,
    /// Chain of the taker-funded leg.
    pub destination_chain: ChainKind,
    /// Current state.
    pub state: SwapState,
    /// Source leg, once locked.
    pub source: Option<LegLocator>,
    /// Destination leg, once locked.
    pub destination: Option<LegLocator>,
    /// Revealed secret, once observed.
    pub revealed_secret: Option<Secret>,
    /// Created at.
    pub created_at: u64,
}

impl SwapRecord {
    /// New record in `Initiated`.
    pub fn new(
        order_hash: Hash,
        source_chain: ChainKind,
        destination_chain: ChainKind,
        created_at: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_hash,
            source_chain,
            destination_chain,
            state: SwapState::Initiated,
            source: None,
            destination: None,
            revealed_secret: None,
            created_at,
        }
    }

    /// Transition to new state.
    pub fn transition_to(&mut self, new_state: SwapState) -> Result<(), EscrowError> {
        if !self.state.can_transition_to(new_state) {
            return Err(EscrowError::InvalidSwapTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", new_state),
            });
        }
        self.state = new_state;
        Ok(())
    }

    /// Records the source leg.
    pub fn set_source(&mut self, locator: LegLocator) -> Result<(), EscrowError> {
        self.transition_to(SwapState::SourceLocked)?;
        self.source = Some(locator);
        Ok(())
    }

    /// Records the destination leg.
    pub fn set_destination(&mut self, locator: LegLocator) -> Result<(), EscrowError> {
        self.transition_to(SwapState::DestinationLocked)?;
        self.destination = Some(locator);
        Ok(())
    }

    /// Records the destination claim and the secret it revealed.
    pub fn set_claimed(&mut self, secret: Secret) -> Result<(), EscrowError> {
        self.transition_to(SwapState::DestinationClaimed)?;
        self.revealed_secret = Some(secret);
        Ok(())
    }
}
