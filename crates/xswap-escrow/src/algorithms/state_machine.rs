//! # Escrow State Machine (account model)
//!
//! Evaluates a transition request against the guard table and returns the
//! transfers it authorizes. Nothing here moves funds: the caller applies the
//! [`Settlement`] only after every check passed, so each rejected request
//! leaves state and balances untouched.
//!
//! Check order is fixed: resolution state, commitment self-check, leg
//! support, caller authority, time window, secret.

use super::address::derive_address;
use super::guards::{Transition, GUARD_TABLE};
use super::secret::HashScheme;
use crate::domain::{
    Address, EscrowError, EscrowInstance, Immutables, Role, Secret, Settlement, Transfer, U256,
};

/// A caller's request to resolve an escrow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Requested transition.
    pub transition: Transition,
    /// Transaction sender.
    pub caller: Address,
    /// Hashlock preimage for withdrawals.
    pub secret: Option<Secret>,
    /// Explicit principal recipient (source withdraw only).
    pub target: Option<Address>,
}

impl TransitionRequest {
    /// Private withdrawal.
    pub fn withdraw(caller: Address, secret: Secret) -> Self {
        Self {
            transition: Transition::Withdraw,
            caller,
            secret: Some(secret),
            target: None,
        }
    }

    /// Private withdrawal paying the principal to `target`.
    pub fn withdraw_to(caller: Address, secret: Secret, target: Address) -> Self {
        Self {
            target: Some(target),
            ..Self::withdraw(caller, secret)
        }
    }

    /// Public withdrawal.
    pub fn public_withdraw(caller: Address, secret: Secret) -> Self {
        Self {
            transition: Transition::PublicWithdraw,
            caller,
            secret: Some(secret),
            target: None,
        }
    }

    /// Private cancellation.
    pub fn cancel(caller: Address) -> Self {
        Self {
            transition: Transition::Cancel,
            caller,
            secret: None,
            target: None,
        }
    }

    /// Public cancellation.
    pub fn public_cancel(caller: Address) -> Self {
        Self {
            transition: Transition::PublicCancel,
            caller,
            secret: None,
            target: None,
        }
    }
}

/// Fails unless `immutables` derive the instance's own address.
pub fn verify_identity(
    instance: &EscrowInstance,
    immutables: &Immutables,
) -> Result<(), EscrowError> {
    let computed = derive_address(&instance.factory, &instance.implementation, &immutables.hash());
    if computed != instance.address {
        return Err(EscrowError::CommitmentMismatch {
            expected: instance.address,
            computed,
        });
    }
    Ok(())
}

/// Decides whether `request` is legal at `now` and what it pays out.
pub fn authorize(
    instance: &EscrowInstance,
    immutables: &Immutables,
    request: &TransitionRequest,
    now: u64,
) -> Result<Settlement, EscrowError> {
    if instance.state.is_terminal() {
        return Err(EscrowError::AlreadyResolved {
            address: instance.address,
        });
    }
    verify_identity(instance, immutables)?;

    let role = instance.role;
    let guard = request.transition.guard();
    let redirect_allowed = role == Role::Source && request.transition == Transition::Withdraw;
    if !guard.supported_on(role) || (request.target.is_some() && !redirect_allowed) {
        return Err(EscrowError::UnsupportedTransition {
            transition: request.transition,
            role,
        });
    }

    guard.check_authority(&request.caller, &immutables.taker)?;
    guard.check_window(role, &immutables.timelocks, now)?;

    let secret = if guard.requires_secret {
        let secret = request
            .secret
            .ok_or(EscrowError::MissingSecret(request.transition))?;
        if !HashScheme::Keccak256.verify(&secret, &immutables.hashlock) {
            return Err(EscrowError::InvalidSecret);
        }
        Some(secret)
    } else {
        None
    };

    let recipient = request
        .target
        .unwrap_or_else(|| guard.payee.resolve(role, immutables));

    Ok(Settlement {
        escrow: instance.address,
        transition: request.transition,
        principal: Transfer {
            to: recipient,
            token: immutables.token,
            amount: immutables.amount,
        },
        deposit: Transfer {
            to: request.caller,
            token: Address::NATIVE,
            amount: immutables.safety_deposit,
        },
        secret,
    })
}

/// Emergency sweep of arbitrary assets to the taker after the rescue delay.
///
/// Independent of the resolution state.
pub fn authorize_rescue(
    instance: &EscrowInstance,
    immutables: &Immutables,
    caller: &Address,
    token: Address,
    amount: U256,
    rescue_delay: u32,
    now: u64,
) -> Result<Transfer, EscrowError> {
    verify_identity(instance, immutables)?;
    if *caller != immutables.taker {
        return Err(EscrowError::InvalidRescueCaller { caller: *caller });
    }
    let opens_at = immutables.timelocks.rescue_start(rescue_delay);
    if now < opens_at {
        return Err(EscrowError::RescueNotOpen { opens_at, now });
    }
    Ok(Transfer {
        to: immutables.taker,
        token,
        amount,
    })
}

/// Transitions whose window contains `now` on a leg, ignoring caller and secret.
pub fn open_transitions(role: Role, immutables: &Immutables, now: u64) -> Vec<Transition> {
    GUARD_TABLE
        .iter()
        .filter(|guard| {
            guard
                .window(role, &immutables.timelocks)
                .map(|window| window.contains(now))
                .unwrap_or(false)
        })
        .map(|guard| guard.transition)
        .collect()
}
