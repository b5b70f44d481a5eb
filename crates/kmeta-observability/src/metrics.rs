//! Broker Metrics Registry
//!
//! Owns the Prometheus metric families shared by every broker queue. The
//! families are registered once per registry and differentiated per queue by
//! the `name` label, so any number of queues can be instrumented against the
//! same registry without conflicts.

use crate::tags::QueueOp;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder, exponential_buckets, proto::MetricFamily,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Global metrics registry instance
static METRICS_REGISTRY: OnceLock<Arc<BrokerMetrics>> = OnceLock::new();

/// Metric name suffix of the per-kind event counter
pub const QUEUE_ADDS_KEY: &str = "queue_adds";
/// Metric name suffix of the queue latency histogram
pub const QUEUE_LATENCY_KEY: &str = "queue_queue_duration_seconds";

/// Label carrying the queue name
pub const NAME_LABEL: &str = "name";
/// Label carrying the operation kind
pub const TYPE_LABEL: &str = "type";

/// Metric naming and latency bucket layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Optional namespace prepended to every metric name
    pub namespace: Option<String>,
    /// Subsystem prepended to every metric name
    pub subsystem: String,
    /// Upper bound of the first latency bucket, in seconds
    pub latency_start: f64,
    /// Growth factor between consecutive latency buckets
    pub latency_factor: f64,
    /// Number of latency buckets
    pub latency_buckets: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            subsystem: "broker".to_string(),
            latency_start: 10e-9,
            latency_factor: 10.0,
            latency_buckets: 10,
        }
    }
}

impl MetricsConfig {
    /// Compute the latency bucket boundaries, in seconds
    pub fn latency_bucket_bounds(&self) -> Result<Vec<f64>, MetricsError> {
        if !(self.latency_start.is_finite() && self.latency_start > 0.0) {
            return Err(MetricsError::InvalidBuckets(format!(
                "start must be a positive number, got {}",
                self.latency_start
            )));
        }
        if !(self.latency_factor.is_finite() && self.latency_factor > 1.0) {
            return Err(MetricsError::InvalidBuckets(format!(
                "factor must be greater than 1, got {}",
                self.latency_factor
            )));
        }
        if self.latency_buckets == 0 {
            return Err(MetricsError::InvalidBuckets(
                "at least one bucket is required".to_string(),
            ));
        }

        Ok(exponential_buckets(
            self.latency_start,
            self.latency_factor,
            self.latency_buckets,
        )?)
    }

    fn counter_opts(&self, name: &str, help: &str) -> Opts {
        let opts = Opts::new(name, help).subsystem(self.subsystem.as_str());
        match &self.namespace {
            Some(namespace) => opts.namespace(namespace.as_str()),
            None => opts,
        }
    }

    fn histogram_opts(&self, name: &str, help: &str) -> Result<HistogramOpts, MetricsError> {
        let opts = HistogramOpts::new(name, help)
            .subsystem(self.subsystem.as_str())
            .buckets(self.latency_bucket_bounds()?);
        Ok(match &self.namespace {
            Some(namespace) => opts.namespace(namespace.as_str()),
            None => opts,
        })
    }
}

/// Metric families for broker queues
#[derive(Debug, Clone)]
pub struct BrokerMetrics {
    // cardinality: queues x 3
    queue_adds: IntCounterVec,
    // cardinality: queues
    queue_latency: HistogramVec,
    prometheus_registry: Registry,
}

impl BrokerMetrics {
    /// Create the metric families in a fresh registry
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        Self::register_into(&Registry::new(), config)
    }

    /// Create the metric families and register them with an existing registry
    ///
    /// # Errors
    ///
    /// Fails if the bucket layout is invalid or the families are already
    /// registered with `registry`.
    pub fn register_into(
        registry: &Registry,
        config: &MetricsConfig,
    ) -> Result<Self, MetricsError> {
        let queue_adds = IntCounterVec::new(
            config.counter_opts(QUEUE_ADDS_KEY, "Total number of events handled by the queue"),
            &[NAME_LABEL, TYPE_LABEL],
        )?;

        let queue_latency = HistogramVec::new(
            config.histogram_opts(
                QUEUE_LATENCY_KEY,
                "How long in seconds an event stays in the queue before being requested.",
            )?,
            &[NAME_LABEL],
        )?;

        registry.register(Box::new(queue_adds.clone()))?;
        registry.register(Box::new(queue_latency.clone()))?;

        tracing::info!(
            subsystem = config.subsystem.as_str(),
            namespace = config.namespace.as_deref().unwrap_or(""),
            buckets = config.latency_buckets,
            "Registered broker queue metrics"
        );

        Ok(Self {
            queue_adds,
            queue_latency,
            prometheus_registry: registry.clone(),
        })
    }

    /// Counter of events of kind `op` handled by queue `name`
    pub fn queue_adds(&self, name: &str, op: QueueOp) -> IntCounter {
        self.queue_adds.with_label_values(&[name, op.as_str()])
    }

    /// Latency histogram of queue `name`
    pub fn queue_latency(&self, name: &str) -> Histogram {
        self.queue_latency.with_label_values(&[name])
    }

    /// Get Prometheus registry for metrics export
    pub fn prometheus_registry(&self) -> &Registry {
        &self.prometheus_registry
    }

    /// Collect every metric family in the registry
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.prometheus_registry.gather()
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        Ok(encoder.encode_to_string(&self.gather())?)
    }
}

/// Initialize global metrics registry
pub fn init_metrics_registry(config: &MetricsConfig) -> Result<(), MetricsError> {
    let registry = Arc::new(BrokerMetrics::new(config)?);
    METRICS_REGISTRY
        .set(registry)
        .map_err(|_| MetricsError::AlreadyInitialized)?;
    Ok(())
}

/// Get global metrics registry
pub fn get_metrics_registry() -> Option<Arc<BrokerMetrics>> {
    METRICS_REGISTRY.get().cloned()
}

/// Get global metrics registry, installing the default layout on first use
pub fn global_metrics_registry() -> Result<Arc<BrokerMetrics>, MetricsError> {
    if let Some(registry) = METRICS_REGISTRY.get() {
        return Ok(Arc::clone(registry));
    }

    let candidate = Arc::new(BrokerMetrics::new(&MetricsConfig::default())?);
    // A concurrent initializer may win; everyone ends up with the stored one.
    Ok(Arc::clone(METRICS_REGISTRY.get_or_init(|| candidate)))
}

/// Metrics system errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Invalid latency buckets: {0}")]
    InvalidBuckets(String),

    #[error("Metrics registry not initialized")]
    NotInitialized,

    #[error("Metrics registry already initialized")]
    AlreadyInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_queue_name() -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("queue{}", &id[0..8])
    }

    #[test]
    fn test_default_bucket_layout() {
        let bounds = MetricsConfig::default().latency_bucket_bounds().unwrap();
        assert_eq!(bounds.len(), 10);
        assert!((bounds[0] - 1e-8).abs() < 1e-20);
        assert!((bounds[9] - 10.0).abs() < 1e-9);
        for pair in bounds.windows(2) {
            assert!((pair[1] / pair[0] - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_invalid_bucket_layout() {
        let config = MetricsConfig {
            latency_factor: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            BrokerMetrics::new(&config),
            Err(MetricsError::InvalidBuckets(_))
        ));

        let config = MetricsConfig {
            latency_buckets: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.latency_bucket_bounds(),
            Err(MetricsError::InvalidBuckets(_))
        ));

        let config = MetricsConfig {
            latency_start: -1.0,
            ..Default::default()
        };
        assert!(config.latency_bucket_bounds().is_err());
    }

    #[test]
    fn test_metric_family_names() {
        let metrics = BrokerMetrics::new(&MetricsConfig::default()).unwrap();
        let name = test_queue_name();
        metrics.queue_adds(&name, QueueOp::Add).inc();
        metrics.queue_latency(&name).observe(0.5);

        assert_eq!(metrics.gather().len(), 2);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("# TYPE broker_queue_adds counter"));
        assert!(rendered.contains("# TYPE broker_queue_queue_duration_seconds histogram"));
        assert!(rendered.contains(&format!(
            "broker_queue_queue_duration_seconds_count{{name=\"{}\"}} 1",
            name
        )));
    }

    #[test]
    fn test_latency_family_repeats_queue_prefix() {
        let metrics = BrokerMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.queue_latency("pods").observe(0.5);

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("# TYPE broker_queue_queue_duration_seconds histogram"));
        assert!(rendered.contains("broker_queue_queue_duration_seconds_count{name=\"pods\"} 1"));
        assert!(rendered.contains("broker_queue_queue_duration_seconds_sum{name=\"pods\"} 0.5"));
        assert!(!rendered.contains("# TYPE broker_queue_duration_seconds"));
    }

    #[test]
    fn test_namespace_prefix() {
        let config = MetricsConfig {
            namespace: Some("kmeta".to_string()),
            ..Default::default()
        };
        let metrics = BrokerMetrics::new(&config).unwrap();
        metrics.queue_adds("pods", QueueOp::Delete).inc();

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("kmeta_broker_queue_adds{name=\"pods\",type=\"Delete\"} 1"));
    }

    #[test]
    fn test_label_resolution_is_idempotent() {
        let metrics = BrokerMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.queue_adds("pods", QueueOp::Update).inc();
        metrics.queue_adds("pods", QueueOp::Update).inc();
        assert_eq!(metrics.queue_adds("pods", QueueOp::Update).get(), 2);
        assert_eq!(metrics.queue_adds("services", QueueOp::Update).get(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = Registry::new();
        BrokerMetrics::register_into(&registry, &MetricsConfig::default()).unwrap();
        let result = BrokerMetrics::register_into(&registry, &MetricsConfig::default());
        assert!(matches!(result, Err(MetricsError::Prometheus(_))));
    }

    #[test]
    fn test_independent_registries_do_not_conflict() {
        let first = BrokerMetrics::new(&MetricsConfig::default()).unwrap();
        let second = BrokerMetrics::new(&MetricsConfig::default()).unwrap();
        first.queue_adds("pods", QueueOp::Add).inc();
        assert_eq!(second.queue_adds("pods", QueueOp::Add).get(), 0);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let first = global_metrics_registry().unwrap();
        let second = global_metrics_registry().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(get_metrics_registry().is_some());
        assert!(matches!(
            init_metrics_registry(&MetricsConfig::default()),
            Err(MetricsError::AlreadyInitialized)
        ));
    }
}
