//! # XSwap Test Suite
//!
//! Unified test crate exercising the escrow core through its ports.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs    # Single-leg escrow lifecycle on the EVM factory
//!     └── cross_chain.rs  # Coordinated Bitcoin <-> EVM swaps
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p xswap-tests
//! cargo test -p xswap-tests integration::cross_chain::
//! ```

pub mod integration;
