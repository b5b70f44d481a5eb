//! Structured Logging Setup
//!
//! Installs the process-wide `tracing` subscriber used by the broker. Output
//! is JSON by default; the filter honours `RUST_LOG` and falls back to `info`.

use crate::{LogFormat, ObservabilityConfig, ObservabilityError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Build the log filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize tracing subsystem
///
/// # Errors
///
/// Fails with [`ObservabilityError::TracingInit`] if a global subscriber is
/// already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;

    tracing::info!(
        log_format = ?config.log_format,
        metrics_enabled = config.metrics_enabled,
        "Initialized structured tracing"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = ObservabilityConfig {
            log_format: LogFormat::Pretty,
            ..Default::default()
        };

        // Only one global subscriber can exist per process.
        let _ = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(matches!(second, Err(ObservabilityError::TracingInit(_))));
    }

    #[test]
    fn test_env_filter_builds() {
        let filter = env_filter();
        assert!(!filter.to_string().is_empty());
    }
}
