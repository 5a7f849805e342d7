//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or full directive
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Network identifier (mainnet, testnet, signet, regtest)
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "xswap".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            network: "regtest".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `XSWAP_SERVICE_NAME`: Service name (default: xswap)
    /// - `XSWAP_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `XSWAP_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `XSWAP_NETWORK`: Network name (default: regtest)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("XSWAP_SERVICE_NAME").unwrap_or_else(|_| "xswap".to_string()),

            log_level: env::var("XSWAP_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("XSWAP_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            network: env::var("XSWAP_NETWORK").unwrap_or_else(|_| "regtest".to_string()),
        }
    }

    /// Service name qualified by network, e.g. `xswap-testnet`.
    pub fn full_service_name(&self) -> String {
        format!("{}-{}", self.service_name, self.network)
    }
}
