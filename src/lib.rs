//! # kmeta
//!
//! Broker queue instrumentation for the kmeta metadata collector. This crate
//! re-exports the event model and the queue metrics so a broker only needs a
//! single dependency.

pub use kmeta_core::{Event, EventKey, EventKeyError, EventType, ResourceEvent};
pub use kmeta_observability::{
    BrokerMetrics, LogFormat, MetricsConfig, MetricsError, ObservabilityConfig,
    ObservabilityError, QueueMetrics, QueueObserver, QueueOp, init_observability,
};
