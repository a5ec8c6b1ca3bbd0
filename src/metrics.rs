//! The observability sink. Every method has a no-op default; a pool used
//! without `Pool::with_metrics` pays no cost for this interface.

use std::sync::Arc;
use std::time::Duration;

use crate::error::BoxError;

/// A zero-argument callable the sink invokes on its own schedule (e.g. when
/// a Prometheus scrape comes in) to sample a current pool scalar.
pub type Sampler = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Receives counters, histograms, and gauge samplers from a [`Pool`](crate::Pool).
///
/// All methods default to doing nothing, so implementors only override the
/// metrics they actually export.
pub trait MetricsSink: Send + Sync {
    /// Time spent by a `lease` call between starting and obtaining an
    /// instance (whether served immediately or after queuing).
    fn record_lease_wait_time(&self, _duration: Duration) {}

    /// Time spent running `is_ready` + (optionally) `prepare`.
    fn record_preparation_time(&self, _duration: Duration) {}

    /// A `lease` call itself failed: the wait was cancelled or timed out,
    /// or the factory errored while allocating a fresh instance.
    /// Preparation failures are reported separately, through
    /// `record_preparation_exception`, even when they surface to the
    /// caller as a failed `lease`.
    fn record_lease_exception(&self, _error: &dyn std::error::Error) {}

    /// `is_ready` or `prepare` itself errored or timed out.
    fn record_preparation_exception(&self, _error: &BoxError) {}

    /// Register a gauge sampler for `allocated`.
    fn register_items_allocated_observer(&self, _sampler: Sampler) {}

    /// Register a gauge sampler for `available`.
    fn register_items_available_observer(&self, _sampler: Sampler) {}

    /// Register a gauge sampler for `active_leases`.
    fn register_active_leases_observer(&self, _sampler: Sampler) {}

    /// Register a gauge sampler for `queued_leases`.
    fn register_queued_leases_observer(&self, _sampler: Sampler) {}

    /// Register a gauge sampler for `utilization_rate`.
    fn register_utilization_rate_observer(&self, _sampler: Sampler) {}
}

/// The default sink: records nothing, registers no observers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// A sink that counts calls, for asserting on metric emission in tests.
    #[derive(Default)]
    pub struct CountingSink {
        pub lease_waits: AtomicU64,
        pub preparation_times: AtomicU64,
        pub lease_exceptions: AtomicU64,
        pub preparation_exceptions: AtomicU64,
        pub allocated_samplers: Mutex<Vec<Sampler>>,
    }

    impl MetricsSink for CountingSink {
        fn record_lease_wait_time(&self, _duration: Duration) {
            self.lease_waits.fetch_add(1, Ordering::SeqCst);
        }

        fn record_preparation_time(&self, _duration: Duration) {
            self.preparation_times.fetch_add(1, Ordering::SeqCst);
        }

        fn record_lease_exception(&self, _error: &dyn std::error::Error) {
            self.lease_exceptions.fetch_add(1, Ordering::SeqCst);
        }

        fn record_preparation_exception(&self, _error: &BoxError) {
            self.preparation_exceptions.fetch_add(1, Ordering::SeqCst);
        }

        fn register_items_allocated_observer(&self, sampler: Sampler) {
            self.allocated_samplers.lock().unwrap().push(sampler);
        }
    }
}
