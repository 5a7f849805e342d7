//! # Domain Errors
//!
//! Every rejected path is fund-safe: no transfer happens before an error is
//! returned. [`ErrorClass`] tells the orchestration layer whether retrying
//! later can help.

use super::timelocks::Stage;
use super::value_objects::{Address, Role, U256};
use crate::algorithms::guards::Transition;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Coarse error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Malformed or inconsistent parameters; fatal to the creation attempt.
    ParameterViolation,
    /// Wrong caller, wrong window or wrong secret; retriable later.
    Authorization,
    /// Presented immutables do not hash to the instance identity. Fatal.
    CommitmentMismatch,
    /// Attached value or available balance does not cover the transfer.
    ValueMismatch,
    /// Instance already consumed.
    AlreadyResolved,
    /// Port or adapter failure outside the protocol.
    Infrastructure,
}

impl ErrorClass {
    /// Label used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::ParameterViolation => "parameter_violation",
            ErrorClass::Authorization => "authorization",
            ErrorClass::CommitmentMismatch => "commitment_mismatch",
            ErrorClass::ValueMismatch => "value_mismatch",
            ErrorClass::AlreadyResolved => "already_resolved",
            ErrorClass::Infrastructure => "infrastructure",
        }
    }

    /// Whether the same request may succeed later without changes.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorClass::Authorization)
    }
}

/// Bitcoin script template and predicate errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Locktime is not a time-based CLTV value.
    #[error("locktime {0} outside time-based range [500000000, 4294967295]")]
    LocktimeOutOfRange(u64),

    /// Guard table lacks a branch the template needs.
    #[error("guard table has no {0} branch")]
    MissingGuard(&'static str),

    /// Script bytes do not follow the HTLC template.
    #[error("script does not match HTLC template at byte {offset}: {reason}")]
    TemplateMismatch {
        /// Byte offset of the first mismatch.
        offset: usize,
        /// What was expected there.
        reason: &'static str,
    },

    /// Witness stack shape is wrong.
    #[error("malformed witness: {0}")]
    MalformedWitness(&'static str),

    /// Witness script differs from the committed one.
    #[error("witness script does not match output commitment")]
    ScriptHashMismatch,

    /// Signature check failed.
    #[error("signature verification failed")]
    InvalidSignature,

    /// Preimage does not hash to the committed secret hash.
    #[error("preimage does not match secret hash")]
    SecretMismatch,

    /// Spending transaction locktime is below the script locktime.
    #[error("locktime not reached: script {script_locktime}, transaction {tx_lock_time}")]
    LocktimeNotReached {
        /// Locktime committed in the script.
        script_locktime: u32,
        /// nLockTime of the spending transaction.
        tx_lock_time: u32,
    },

    /// Spending transaction is not final yet.
    #[error("transaction locktime {tx_lock_time} not final at median time {median_time_past}")]
    LocktimeNotFinal {
        /// nLockTime of the spending transaction.
        tx_lock_time: u32,
        /// Chain median time past.
        median_time_past: u64,
    },

    /// Address encoding failed.
    #[error("address encoding failed: {0}")]
    AddressEncoding(String),

    /// Signing backend failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl ScriptError {
    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            ScriptError::InvalidSignature
            | ScriptError::SecretMismatch
            | ScriptError::LocktimeNotReached { .. }
            | ScriptError::LocktimeNotFinal { .. } => ErrorClass::Authorization,
            ScriptError::ScriptHashMismatch => ErrorClass::CommitmentMismatch,
            ScriptError::Signing(_) => ErrorClass::Infrastructure,
            _ => ErrorClass::ParameterViolation,
        }
    }
}

/// Escrow error types.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// Stages of one leg are not strictly increasing.
    #[error("{role} stages out of order: {earlier}={earlier_offset} >= {later}={later_offset}")]
    InvalidStageOrder {
        /// Leg whose stages are inconsistent.
        role: Role,
        /// Earlier stage.
        earlier: Stage,
        /// Its offset.
        earlier_offset: u32,
        /// Later stage.
        later: Stage,
        /// Its offset.
        later_offset: u32,
    },

    /// Destination leg would still be cancellable after the source leg.
    #[error("destination cancels at {destination_cancellation}, source at {source_cancellation}")]
    CrossChainOrdering {
        /// Absolute destination cancellation start.
        destination_cancellation: u64,
        /// Absolute source cancellation start.
        source_cancellation: u64,
    },

    /// Destination deadline is later than the observed source deadline.
    #[error("destination cancels at {destination_cancellation} > {source_cancellation_deadline}")]
    InvalidCreationTime {
        /// Absolute destination cancellation start.
        destination_cancellation: u64,
        /// Source cancellation timestamp supplied by the caller.
        source_cancellation_deadline: u64,
    },

    /// Byte field of the wrong width.
    #[error("invalid {field} length: expected {expected}, got {got}")]
    InvalidLength {
        /// Field name.
        field: &'static str,
        /// Required width.
        expected: usize,
        /// Received width.
        got: usize,
    },

    /// The transition does not exist for this leg.
    #[error("{transition} is not available on the {role} leg")]
    UnsupportedTransition {
        /// Requested transition.
        transition: Transition,
        /// Leg.
        role: Role,
    },

    /// Caller lacks authority for the transition.
    #[error("caller {caller:?} may not {transition}")]
    InvalidCaller {
        /// Rejected caller.
        caller: Address,
        /// Requested transition.
        transition: Transition,
    },

    /// Rescue requested by someone other than the taker.
    #[error("caller {caller:?} may not rescue funds")]
    InvalidRescueCaller {
        /// Rejected caller.
        caller: Address,
    },

    /// Stage window not open yet.
    #[error("{transition} opens at {opens_at}, now {now}")]
    NotYetOpen {
        /// Requested transition.
        transition: Transition,
        /// Absolute opening time.
        opens_at: u64,
        /// Current time.
        now: u64,
    },

    /// Stage window already closed.
    #[error("{transition} closed at {closed_at}, now {now}")]
    WindowClosed {
        /// Requested transition.
        transition: Transition,
        /// Absolute closing time.
        closed_at: u64,
        /// Current time.
        now: u64,
    },

    /// Presented secret does not hash to the hashlock.
    #[error("Invalid secret")]
    InvalidSecret,

    /// Withdrawal attempted without a secret.
    #[error("secret required for {0}")]
    MissingSecret(Transition),

    /// Presented immutables do not derive the instance address.
    #[error("immutables commit to {computed:?}, instance is {expected:?}")]
    CommitmentMismatch {
        /// Address of the instance.
        expected: Address,
        /// Address derived from the presented immutables.
        computed: Address,
    },

    /// Instance already consumed.
    #[error("escrow {address:?} already resolved")]
    AlreadyResolved {
        /// Instance address.
        address: Address,
    },

    /// Attached native value is wrong.
    #[error("value mismatch: expected {expected}, got {got}")]
    ValueMismatch {
        /// Required value.
        expected: U256,
        /// Attached value.
        got: U256,
    },

    /// A ledger holder cannot cover a transfer.
    #[error("insufficient {token:?} at {holder:?}: required {required}, held {available}")]
    InsufficientBalance {
        /// Paying account.
        holder: Address,
        /// Asset.
        token: Address,
        /// Amount needed.
        required: U256,
        /// Amount held.
        available: U256,
    },

    /// An escrow is already deployed at the derived address.
    #[error("escrow already deployed at {0:?}")]
    AlreadyDeployed(Address),

    /// No escrow at this address.
    #[error("escrow not found: {0:?}")]
    EscrowNotFound(Address),

    /// Rescue delay not elapsed.
    #[error("rescue opens at {opens_at}, now {now}")]
    RescueNotOpen {
        /// Absolute rescue start.
        opens_at: u64,
        /// Current time.
        now: u64,
    },

    /// Bitcoin script error.
    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    /// Output already spent or never funded.
    #[error("utxo not found: {0}")]
    UtxoNotFound(String),

    /// Secret not yet observable on chain.
    #[error("secret not revealed on {0}")]
    SecretNotRevealed(String),

    /// No swap with this id.
    #[error("unknown swap {0}")]
    UnknownSwap(Uuid),

    /// Invalid swap record state transition.
    #[error("Invalid swap transition: {from} -> {to}")]
    InvalidSwapTransition {
        /// Current state
        from: String,
        /// Attempted state
        to: String,
    },

    /// Another call on this swap has not finished yet.
    #[error("swap {id} busy: move to {pending} in flight")]
    SwapInFlight {
        /// Swap id.
        id: Uuid,
        /// State the pending call is moving to.
        pending: String,
    },

    /// Port failure.
    #[error("chain error: {0}")]
    Chain(String),
}

impl EscrowError {
    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            EscrowError::InvalidStageOrder { .. }
            | EscrowError::CrossChainOrdering { .. }
            | EscrowError::InvalidCreationTime { .. }
            | EscrowError::InvalidLength { .. }
            | EscrowError::UnsupportedTransition { .. }
            | EscrowError::AlreadyDeployed(_)
            | EscrowError::UnknownSwap(_)
            | EscrowError::InvalidSwapTransition { .. }
            | EscrowError::SwapInFlight { .. } => ErrorClass::ParameterViolation,
            EscrowError::InvalidCaller { .. }
            | EscrowError::InvalidRescueCaller { .. }
            | EscrowError::NotYetOpen { .. }
            | EscrowError::WindowClosed { .. }
            | EscrowError::InvalidSecret
            | EscrowError::MissingSecret(_)
            | EscrowError::RescueNotOpen { .. }
            | EscrowError::SecretNotRevealed(_) => ErrorClass::Authorization,
            EscrowError::CommitmentMismatch { .. } => ErrorClass::CommitmentMismatch,
            EscrowError::ValueMismatch { .. } | EscrowError::InsufficientBalance { .. } => {
                ErrorClass::ValueMismatch
            }
            EscrowError::AlreadyResolved { .. } | EscrowError::UtxoNotFound(_) => {
                ErrorClass::AlreadyResolved
            }
            EscrowError::Script(inner) => inner.class(),
            EscrowError::EscrowNotFound(_) | EscrowError::Chain(_) => ErrorClass::Infrastructure,
        }
    }
}
