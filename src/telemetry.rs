use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::controller::{ControllerState, Trigger};

/// Initialize structured logging
///
/// RUST_LOG wins over the configured level when set.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(filter)
            .try_init()?;
    }

    tracing::info!(json = config.json, "brewline telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking a transition to its side effects
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span covering one trigger as it is processed by the controller
pub fn create_transition_span(
    trigger: Trigger,
    state: ControllerState,
    origin: &str,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "controller_transition",
        trigger = %trigger,
        state = %state,
        origin = origin,
        correlation.id = correlation_id,
    )
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    tracing::info!("brewline telemetry shutdown complete");
}
