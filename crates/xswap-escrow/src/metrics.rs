//! # Escrow Metrics
//!
//! Prometheus counters for escrow creation and resolution.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! xswap-escrow = { path = "...", features = ["metrics"] }
//! ```
//!
//! - `xswap_escrows_created_total{role}`
//! - `xswap_escrow_transitions_total{transition}`
//! - `xswap_escrow_rejections_total{class}`

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter_vec, IntCounterVec};

use crate::algorithms::guards::Transition;
use crate::domain::{ErrorClass, Role};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Escrows deployed, labeled by leg.
    pub static ref ESCROWS_CREATED: IntCounterVec = register_int_counter_vec!(
        "xswap_escrows_created_total",
        "Total number of escrows deployed",
        &["role"]
    )
    .expect("Failed to create ESCROWS_CREATED metric");

    /// Successful resolutions, labeled by transition.
    pub static ref ESCROW_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "xswap_escrow_transitions_total",
        "Total number of escrow resolutions",
        &["transition"]
    )
    .expect("Failed to create ESCROW_TRANSITIONS metric");

    /// Rejected requests, labeled by error class.
    pub static ref ESCROW_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "xswap_escrow_rejections_total",
        "Total number of rejected escrow requests",
        &["class"]
    )
    .expect("Failed to create ESCROW_REJECTIONS metric");
}

/// Record an escrow deployment.
#[cfg(feature = "metrics")]
pub fn record_escrow_created(role: Role) {
    ESCROWS_CREATED.with_label_values(&[role.as_str()]).inc();
}

/// Record a successful resolution.
#[cfg(feature = "metrics")]
pub fn record_transition(transition: Transition) {
    ESCROW_TRANSITIONS
        .with_label_values(&[transition.as_str()])
        .inc();
}

/// Record a rejected request.
#[cfg(feature = "metrics")]
pub fn record_rejection(class: ErrorClass) {
    ESCROW_REJECTIONS.with_label_values(&[class.as_str()]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

/// Record an escrow deployment.
#[cfg(not(feature = "metrics"))]
pub fn record_escrow_created(_role: Role) {}

/// Record a successful resolution.
#[cfg(not(feature = "metrics"))]
pub fn record_transition(_transition: Transition) {}

/// Record a rejected request.
#[cfg(not(feature = "metrics"))]
pub fn record_rejection(_class: ErrorClass) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_callable() {
        record_escrow_created(Role::Source);
        record_transition(Transition::PublicCancel);
        record_rejection(ErrorClass::Authorization);
    }
}
