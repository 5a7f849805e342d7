//! Escrow configuration from environment variables.

use crate::domain::{Address, BitcoinNetwork, Role};
use serde::{Deserialize, Serialize};
use std::env;

/// Default rescue delay: 7 days.
pub const DEFAULT_RESCUE_DELAY_SECS: u32 = 7 * 24 * 3600;

/// Deployment parameters shared by every escrow of a factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Delay after deployment before the taker may rescue funds.
    pub rescue_delay_secs: u32,

    /// CREATE2 deployer of all escrow clones.
    pub factory: Address,

    /// Implementation proxied by source escrows.
    pub source_implementation: Address,

    /// Implementation proxied by destination escrows.
    pub destination_implementation: Address,

    /// Network used for Bitcoin address encoding.
    pub bitcoin_network: BitcoinNetwork,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            rescue_delay_secs: DEFAULT_RESCUE_DELAY_SECS,
            factory: Address::new(low_address(0xf0)),
            source_implementation: Address::new(low_address(0xa1)),
            destination_implementation: Address::new(low_address(0xa2)),
            bitcoin_network: BitcoinNetwork::Regtest,
        }
    }
}

// 0x00..00NN, local devnet placeholders
const fn low_address(last: u8) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    bytes
}

impl EscrowConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `XSWAP_RESCUE_DELAY_SECS`: rescue delay (default: 604800)
    /// - `XSWAP_FACTORY`: factory address, hex
    /// - `XSWAP_SRC_IMPL`: source implementation address, hex
    /// - `XSWAP_DST_IMPL`: destination implementation address, hex
    /// - `XSWAP_BTC_NETWORK`: mainnet, testnet, signet or regtest (default: regtest)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let address = |key: &str, fallback: Address| {
            env::var(key)
                .ok()
                .and_then(|v| Address::from_hex(&v))
                .unwrap_or(fallback)
        };

        Self {
            rescue_delay_secs: env::var("XSWAP_RESCUE_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rescue_delay_secs),

            factory: address("XSWAP_FACTORY", defaults.factory),

            source_implementation: address("XSWAP_SRC_IMPL", defaults.source_implementation),

            destination_implementation: address(
                "XSWAP_DST_IMPL",
                defaults.destination_implementation,
            ),

            bitcoin_network: env::var("XSWAP_BTC_NETWORK")
                .ok()
                .and_then(|v| BitcoinNetwork::parse(&v))
                .unwrap_or(defaults.bitcoin_network),
        }
    }

    /// Implementation for a leg.
    pub fn implementation(&self, role: Role) -> Address {
        match role {
            Role::Source => self.source_implementation,
            Role::Destination => self.destination_implementation,
        }
    }
}
