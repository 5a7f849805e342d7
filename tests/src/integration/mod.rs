//! # Integration Tests
//!
//! Escrow scenarios on the in-memory EVM factory, and full swaps driven by
//! the coordinator across both in-memory chains.

pub mod cross_chain;
pub mod scenarios;
