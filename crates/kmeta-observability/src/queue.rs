//! Queue Latency Tracking
//!
//! A broker queue cannot tell how long an event waited without stamping it on
//! the way in. [`QueueMetrics`] does the stamping: the queue calls
//! [`send`](QueueMetrics::send) right before an event becomes visible to
//! consumers and [`receive`](QueueMetrics::receive) right after a consumer
//! takes it. Every event is counted by kind on `send` and its wait time is
//! observed exactly once on the matching `receive`.
//!
//! Queues hold the tracker as `Option<Arc<QueueMetrics<K>>>` and call it
//! through [`QueueObserver`], which turns every call into a no-op when the
//! tracker is absent.

use crate::metrics::{BrokerMetrics, MetricsError, get_metrics_registry};
use crate::tags::QueueOp;
use kmeta_core::Event;
use prometheus::{Histogram, IntCounter};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Per-queue event counters and latency correlation
pub struct QueueMetrics<K> {
    name: String,
    // Indexed by `QueueOp::index`
    counters: [IntCounter; 3],
    latency: Histogram,
    sent_times: Mutex<HashMap<K, Instant>>,
}

impl<K> QueueMetrics<K>
where
    K: Eq + Hash + Clone,
{
    /// Create a tracker for queue `name` backed by `metrics`
    ///
    /// The three per-kind counters are touched immediately so an idle queue
    /// still exports a zero for every kind.
    pub fn new(metrics: &BrokerMetrics, name: impl Into<String>) -> Self {
        let name = name.into();
        let counters = QueueOp::ALL.map(|op| {
            let counter = metrics.queue_adds(&name, op);
            counter.inc_by(0);
            counter
        });
        let latency = metrics.queue_latency(&name);

        tracing::debug!(queue = name.as_str(), "Created queue metrics");

        Self {
            name,
            counters,
            latency,
            sent_times: Mutex::new(HashMap::new()),
        }
    }

    /// Create a tracker against the global registry
    ///
    /// Returns `None` when the global registry was never initialized, which is
    /// how disabled metrics propagate to queues.
    pub fn from_global(name: impl Into<String>) -> Option<Self> {
        get_metrics_registry().map(|metrics| Self::new(&metrics, name))
    }

    /// Create a tracker against the global registry, failing if it is missing
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::NotInitialized`] when the global registry was
    /// never installed.
    pub fn try_from_global(name: impl Into<String>) -> Result<Self, MetricsError> {
        Self::from_global(name).ok_or(MetricsError::NotInitialized)
    }

    /// Record an event about to be enqueued
    pub fn send<E>(&self, event: &E)
    where
        E: Event<Key = K> + ?Sized,
    {
        let now = Instant::now();
        let event_type = event.event_type();
        let op = QueueOp::from_event_type(event_type);
        let key = event.key();

        {
            let mut sent_times = self.sent_times();
            if let Some(op) = op {
                self.counters[op.index()].inc();
            }
            // First-seen entry wins; a repeated send keeps the original stamp.
            sent_times.entry(key).or_insert(now);
        }

        if op.is_none() {
            tracing::debug!(
                queue = self.name.as_str(),
                event_type = %event_type,
                "Event type is not counted"
            );
        }
    }

    /// Record an event just dequeued
    pub fn receive<E>(&self, event: &E)
    where
        E: Event<Key = K> + ?Sized,
    {
        self.receive_key(&event.key());
    }

    /// Record a dequeue by correlation key
    pub fn receive_key(&self, key: &K) {
        let now = Instant::now();

        let observed = {
            let mut sent_times = self.sent_times();
            match sent_times.remove(key) {
                Some(start) => {
                    let elapsed = now.saturating_duration_since(start);
                    self.latency.observe(elapsed.as_secs_f64());
                    true
                }
                None => false,
            }
        };

        if !observed {
            tracing::trace!(
                queue = self.name.as_str(),
                "Received event without a matching send"
            );
        }
    }

    /// Queue name used as the `name` label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of events sent but not yet received
    pub fn pending(&self) -> usize {
        self.sent_times().len()
    }

    /// Whether an event with `key` is waiting in the queue
    pub fn is_pending(&self, key: &K) -> bool {
        self.sent_times().contains_key(key)
    }

    /// Number of events of kind `op` sent through this queue
    pub fn count(&self, op: QueueOp) -> u64 {
        self.counters[op.index()].get()
    }

    /// Number of latency observations and their sum in seconds
    pub fn observed(&self) -> (u64, f64) {
        (
            self.latency.get_sample_count(),
            self.latency.get_sample_sum(),
        )
    }

    fn sent_times(&self) -> MutexGuard<'_, HashMap<K, Instant>> {
        // The table only holds plain data, so a panic elsewhere cannot leave it
        // half-updated.
        self.sent_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K> fmt::Debug for QueueMetrics<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .sent_times
            .lock()
            .map(|sent_times| sent_times.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        f.debug_struct("QueueMetrics")
            .field("name", &self.name)
            .field("pending", &pending)
            .finish()
    }
}

/// Hooks a queue calls around enqueue and dequeue
///
/// Implemented for [`QueueMetrics`] and forwarded through `Arc`, references
/// and `Option`. An absent tracker (`None`) ignores every call.
pub trait QueueObserver<E: ?Sized> {
    /// Called immediately before `event` becomes visible to consumers
    fn send(&self, event: &E);

    /// Called immediately after `event` was handed to a consumer
    fn receive(&self, event: &E);
}

impl<K, E> QueueObserver<E> for QueueMetrics<K>
where
    K: Eq + Hash + Clone,
    E: Event<Key = K> + ?Sized,
{
    fn send(&self, event: &E) {
        QueueMetrics::send(self, event);
    }

    fn receive(&self, event: &E) {
        QueueMetrics::receive(self, event);
    }
}

impl<E, T> QueueObserver<E> for Option<T>
where
    E: ?Sized,
    T: QueueObserver<E>,
{
    fn send(&self, event: &E) {
        if let Some(observer) = self {
            observer.send(event);
        }
    }

    fn receive(&self, event: &E) {
        if let Some(observer) = self {
            observer.receive(event);
        }
    }
}

impl<E, T> QueueObserver<E> for Arc<T>
where
    E: ?Sized,
    T: QueueObserver<E> + ?Sized,
{
    fn send(&self, event: &E) {
        (**self).send(event);
    }

    fn receive(&self, event: &E) {
        (**self).receive(event);
    }
}

impl<E, T> QueueObserver<E> for &T
where
    E: ?Sized,
    T: QueueObserver<E> + ?Sized,
{
    fn send(&self, event: &E) {
        (**self).send(event);
    }

    fn receive(&self, event: &E) {
        (**self).receive(event);
    }
}
