//! # Domain Module
//!
//! Core domain types: timelock word, immutables, escrow and swap entities.

pub mod entities;
pub mod errors;
pub mod immutables;
pub mod secure_secret;
pub mod timelocks;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use immutables::{Immutables, IMMUTABLES_ENCODED_LEN};
pub use secure_secret::SecureSecret;
pub use timelocks::{Stage, StageOffsets, Timelocks, DEPLOYED_AT_OFFSET};
pub use value_objects::*;
