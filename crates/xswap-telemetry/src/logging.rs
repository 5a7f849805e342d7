//! Structured logging setup.
//!
//! Plain output for development, JSON for log shippers. JSON lines carry
//! `timestamp`, `level`, `target`, `fields` and span context.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Fails with
/// [`TelemetryError::AlreadyInitialized`] if a global subscriber exists.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    }

    tracing::info!(
        service = %config.full_service_name(),
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

/// Test-writer subscriber for `cargo test`; repeated calls are no-ops.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Log an escrow event with standard fields.
///
/// ```rust,ignore
/// log_escrow_event!(info, "withdraw", escrow, "[xswap] Escrow resolved", role = %role);
/// ```
#[macro_export]
macro_rules! log_escrow_event {
    ($level:ident, $transition:expr, $escrow:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::$level!(
            transition = $transition,
            escrow = %$escrow,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a swap lifecycle event with standard fields.
///
/// ```rust,ignore
/// log_swap_event!(info, record.id, record.state, "[xswap] Swap source locked", leg = ?locator);
/// ```
#[macro_export]
macro_rules! log_swap_event {
    ($level:ident, $swap_id:expr, $state:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::$level!(
            swap_id = %$swap_id,
            state = ?$state,
            $($($field)*,)?
            $msg
        )
    };
}
