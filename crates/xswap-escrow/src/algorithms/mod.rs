//! # Algorithms Module
//!
//! Pure protocol logic: guard table, state machine, Bitcoin script
//! compilation, address derivation and cross-chain sequencing.

pub mod address;
pub mod bitcoin_script;
pub mod guards;
pub mod secret;
pub mod sequencer;
pub mod state_machine;

pub use address::{clone_init_code, create2, derive_address};
pub use bitcoin_script::{
    evaluate, extract_secret, locktime_from_timestamp, parse_redeem_script, BitcoinHtlc,
    HtlcParams, SpendContext, SpendPath,
};
pub use guards::{Authority, Guard, Payee, StageKind, Transition, Window, GUARD_TABLE};
pub use secret::{HashScheme, SecretBundle};
pub use sequencer::{
    validate, validate_bitcoin_destination, validate_bitcoin_source,
    validate_destination_creation, validate_stage_order,
};
pub use state_machine::{
    authorize, authorize_rescue, open_transitions, verify_identity, TransitionRequest,
};
