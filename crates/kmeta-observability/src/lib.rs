//! kmeta Observability
//!
//! Instrumentation for the broker queue: per-kind event counters, queue
//! latency histograms and the correlation logic that ties an event's enqueue
//! to its dequeue. Also hosts the configuration and structured logging setup
//! shared by the broker processes.

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "metrics")]
pub mod queue;

#[cfg(feature = "subscriber")]
pub mod trace;

pub mod tags;

// Re-export core types for easy access
#[cfg(feature = "metrics")]
pub use metrics::{BrokerMetrics, MetricsConfig, MetricsError};

#[cfg(feature = "metrics")]
pub use queue::{QueueMetrics, QueueObserver};

pub use tags::QueueOp;

use serde::{Deserialize, Serialize};

/// Environment variable toggling metrics collection
pub const ENV_METRICS_ENABLED: &str = "KMETA_METRICS_ENABLED";
/// Environment variable toggling structured logging
pub const ENV_TRACING_ENABLED: &str = "KMETA_TRACING_ENABLED";
/// Environment variable selecting the log output format
pub const ENV_LOG_FORMAT: &str = "KMETA_LOG_FORMAT";
/// Environment variable overriding the metrics subsystem
pub const ENV_METRICS_SUBSYSTEM: &str = "KMETA_METRICS_SUBSYSTEM";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics collection
    pub metrics_enabled: bool,
    /// Enable structured logging
    pub tracing_enabled: bool,
    /// Log output format
    pub log_format: LogFormat,
    /// Metric naming and bucket layout
    #[cfg(feature = "metrics")]
    pub metrics: MetricsConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human readable multi-line output
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(ObservabilityError::Config(format!(
                "unknown log format '{}', expected json or pretty",
                other
            ))),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            tracing_enabled: true,
            log_format: LogFormat::default(),
            #[cfg(feature = "metrics")]
            metrics: MetricsConfig::default(),
        }
    }
}

impl ObservabilityConfig {
    /// Build a configuration from defaults overridden by `KMETA_*` variables
    pub fn from_env() -> Result<Self, ObservabilityError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults overridden by the given lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ObservabilityError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_METRICS_ENABLED) {
            config.metrics_enabled = parse_bool(ENV_METRICS_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACING_ENABLED) {
            config.tracing_enabled = parse_bool(ENV_TRACING_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            config.log_format = value.parse()?;
        }
        #[cfg(feature = "metrics")]
        if let Some(value) = lookup(ENV_METRICS_SUBSYSTEM) {
            config.metrics.subsystem = value;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ObservabilityError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ObservabilityError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}

/// Initialize observability framework
pub fn init_observability(config: ObservabilityConfig) -> Result<(), ObservabilityError> {
    #[cfg(feature = "metrics")]
    if config.metrics_enabled {
        metrics::init_metrics_registry(&config.metrics)?;
    }

    #[cfg(feature = "subscriber")]
    if config.tracing_enabled {
        trace::init_tracing(&config)?;
    }

    Ok(())
}

/// Observability framework errors
#[derive(thiserror::Error, Debug)]
pub enum ObservabilityError {
    #[error("Tracing initialization failed: {0}")]
    TracingInit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(feature = "metrics")]
    #[error("Metrics error: {0}")]
    Metrics(#[from] metrics::MetricsError),
}
