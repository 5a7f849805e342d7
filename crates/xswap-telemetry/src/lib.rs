//! # XSwap Telemetry
//!
//! Log setup shared by XSwap binaries and test suites, plus the structured
//! `log_escrow_event!` / `log_swap_event!` macros used by `xswap-escrow`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use xswap_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//!     // Logs from xswap-escrow are now emitted
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `XSWAP_SERVICE_NAME` | `xswap` | Service name in logs |
//! | `XSWAP_LOG_LEVEL` | `info` | Log level filter |
//! | `XSWAP_JSON_LOGS` | `false` | JSON output |
//! | `XSWAP_NETWORK` | `regtest` | Network name |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};

// Logging macros expand to `$crate::tracing`.
#[doc(hidden)]
pub use tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Filter directive could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A global subscriber was already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Initialize logging.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    init_logging(&config)?;
    Ok(TelemetryGuard {
        service: config.full_service_name(),
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    service: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service, "Shutting down telemetry...");
    }
}
