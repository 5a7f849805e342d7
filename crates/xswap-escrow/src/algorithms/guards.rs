//! # Guard Table
//!
//! One role-agnostic definition of the four resolution transitions. Stages
//! are named by kind and bound to concrete timelock lanes by [`Role`], so
//! the source and destination legs share this table. The EVM evaluation in
//! [`crate::algorithms::state_machine`] and the Bitcoin compilation in
//! [`crate::algorithms::bitcoin_script`] both read from here.

use crate::domain::{Address, EscrowError, Immutables, Role, Stage, Timelocks};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage named independently of the leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Private withdrawal opens.
    Withdrawal,
    /// Public withdrawal opens.
    PublicWithdrawal,
    /// Private cancellation opens; withdrawals close.
    Cancellation,
    /// Public cancellation opens.
    PublicCancellation,
}

impl StageKind {
    /// Concrete lane for a leg. `None` when the leg has no such stage.
    pub fn stage(self, role: Role) -> Option<Stage> {
        match (role, self) {
            (Role::Source, StageKind::Withdrawal) => Some(Stage::SrcWithdrawal),
            (Role::Source, StageKind::PublicWithdrawal) => Some(Stage::SrcPublicWithdrawal),
            (Role::Source, StageKind::Cancellation) => Some(Stage::SrcCancellation),
            (Role::Source, StageKind::PublicCancellation) => Some(Stage::SrcPublicCancellation),
            (Role::Destination, StageKind::Withdrawal) => Some(Stage::DstWithdrawal),
            (Role::Destination, StageKind::PublicWithdrawal) => Some(Stage::DstPublicWithdrawal),
            (Role::Destination, StageKind::Cancellation) => Some(Stage::DstCancellation),
            (Role::Destination, StageKind::PublicCancellation) => None,
        }
    }
}

/// Resolution transitions out of `Deployed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    /// Taker presents the secret.
    Withdraw,
    /// Anyone presents the secret.
    PublicWithdraw,
    /// Taker cancels.
    Cancel,
    /// Anyone cancels.
    PublicCancel,
}

impl Transition {
    /// All transitions in table order.
    pub const ALL: [Transition; 4] = [
        Transition::Withdraw,
        Transition::PublicWithdraw,
        Transition::Cancel,
        Transition::PublicCancel,
    ];

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Withdraw => "withdraw",
            Transition::PublicWithdraw => "public_withdraw",
            Transition::Cancel => "cancel",
            Transition::PublicCancel => "public_cancel",
        }
    }

    /// Guard row for this transition.
    pub fn guard(self) -> &'static Guard {
        &GUARD_TABLE[self as usize]
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may trigger a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    /// Only the taker of the immutables.
    Taker,
    /// Any caller.
    Anyone,
}

/// Which party receives the principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payee {
    /// Secret-holder side: taker on source, maker on destination.
    Redeemer,
    /// Timeout side: maker on source, taker on destination.
    Refunder,
}

impl Payee {
    /// Resolves the payee to an account for a leg.
    pub fn resolve(self, role: Role, immutables: &Immutables) -> Address {
        match (role, self) {
            (Role::Source, Payee::Redeemer) | (Role::Destination, Payee::Refunder) => {
                immutables.taker
            }
            (Role::Source, Payee::Refunder) | (Role::Destination, Payee::Redeemer) => {
                immutables.maker
            }
        }
    }
}

/// Absolute window of a transition on one instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// First second the transition is legal.
    pub opens_at: u64,
    /// First second it is no longer legal, if bounded.
    pub closes_at: Option<u64>,
}

impl Window {
    /// Whether `now` lies in `[opens_at, closes_at)`.
    pub fn contains(&self, now: u64) -> bool {
        now >= self.opens_at && self.closes_at.map_or(true, |close| now < close)
    }
}

/// One row of the guard table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Guard {
    /// Transition guarded by this row.
    pub transition: Transition,
    /// Stage at which the window opens.
    pub opens: StageKind,
    /// Stage at which the window closes, if any.
    pub closes: Option<StageKind>,
    /// Required caller.
    pub authority: Authority,
    /// Whether the hashlock preimage must be presented.
    pub requires_secret: bool,
    /// Principal recipient.
    pub payee: Payee,
}

/// The shared state-machine definition, indexed by [`Transition`].
pub static GUARD_TABLE: [Guard; 4] = [
    Guard {
        transition: Transition::Withdraw,
        opens: StageKind::Withdrawal,
        closes: Some(StageKind::Cancellation),
        authority: Authority::Taker,
        requires_secret: true,
        payee: Payee::Redeemer,
    },
    Guard {
        transition: Transition::PublicWithdraw,
        opens: StageKind::PublicWithdrawal,
        closes: Some(StageKind::Cancellation),
        authority: Authority::Anyone,
        requires_secret: true,
        payee: Payee::Redeemer,
    },
    Guard {
        transition: Transition::Cancel,
        opens: StageKind::Cancellation,
        closes: None,
        authority: Authority::Taker,
        requires_secret: false,
        payee: Payee::Refunder,
    },
    Guard {
        transition: Transition::PublicCancel,
        opens: StageKind::PublicCancellation,
        closes: None,
        authority: Authority::Anyone,
        requires_secret: false,
        payee: Payee::Refunder,
    },
];

impl Guard {
    /// Whether the leg supports this transition at all.
    pub fn supported_on(&self, role: Role) -> bool {
        self.opens.stage(role).is_some()
    }

    /// Binds the row to concrete timestamps.
    pub fn window(&self, role: Role, timelocks: &Timelocks) -> Result<Window, EscrowError> {
        let unsupported = || EscrowError::UnsupportedTransition {
            transition: self.transition,
            role,
        };
        let opens_at = timelocks.get(self.opens.stage(role).ok_or_else(unsupported)?);
        let closes_at = match self.closes {
            Some(kind) => Some(timelocks.get(kind.stage(role).ok_or_else(unsupported)?)),
            None => None,
        };
        Ok(Window { opens_at, closes_at })
    }

    /// Caller check.
    pub fn check_authority(&self, caller: &Address, taker: &Address) -> Result<(), EscrowError> {
        match self.authority {
            Authority::Anyone => Ok(()),
            Authority::Taker if caller == taker => Ok(()),
            Authority::Taker => Err(EscrowError::InvalidCaller {
                caller: *caller,
                transition: self.transition,
            }),
        }
    }

    /// Time check.
    pub fn check_window(
        &self,
        role: Role,
        timelocks: &Timelocks,
        now: u64,
    ) -> Result<(), EscrowError> {
        let window = self.window(role, timelocks)?;
        if now < window.opens_at {
            return Err(EscrowError::NotYetOpen {
                transition: self.transition,
                opens_at: window.opens_at,
                now,
            });
        }
        if let Some(closed_at) = window.closes_at {
            if now >= closed_at {
                return Err(EscrowError::WindowClosed {
                    transition: self.transition,
                    closed_at,
                    now,
                });
            }
        }
        Ok(())
    }
}
