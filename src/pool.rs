//! The pool core: idle store, waiter queue, allocation counter, and the
//! lease / release / clear / dispose state machine described in the crate's
//! top-level documentation.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_channel::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{BoxError, Error, Result};
use crate::factory::Factory;
use crate::metrics::{MetricsSink, NoopSink};
use crate::options::Options;
use crate::prepare::{NoopStrategy, PreparationStrategy};

struct Idle<T> {
    item: T,
    idle_since: Instant,
}

struct Inner<T> {
    allocated: usize,
    idle: VecDeque<Idle<T>>,
    waiters: VecDeque<oneshot::Sender<T>>,
    disposed: bool,
}

/// A generic, concurrent object pool.
///
/// Cloning a `Pool` is cheap (an `Arc` bump) and every clone refers to the
/// same underlying idle store, waiter queue, and allocation counter.
pub struct Pool<T> {
    inner: Arc<Mutex<Inner<T>>>,
    factory: Arc<dyn Factory<T>>,
    preparation: Arc<dyn PreparationStrategy<T>>,
    preparation_required: bool,
    metrics: Arc<dyn MetricsSink>,
    options: Options,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            factory: Arc::clone(&self.factory),
            preparation: Arc::clone(&self.preparation),
            preparation_required: self.preparation_required,
            metrics: Arc::clone(&self.metrics),
            options: self.options.clone(),
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Pool")
            .field("allocated", &inner.allocated)
            .field("available", &inner.idle.len())
            .field("queued", &inner.waiters.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Build a pool with no preparation strategy and the default (no-op)
    /// metrics sink.
    pub async fn new(options: Options, factory: Arc<dyn Factory<T>>) -> Result<Self> {
        Self::with_collaborators(options, factory, None, None).await
    }

    /// Build a pool that verifies/reinitializes instances before handing
    /// them out.
    pub async fn with_preparation(
        options: Options,
        factory: Arc<dyn Factory<T>>,
        preparation: Arc<dyn PreparationStrategy<T>>,
    ) -> Result<Self> {
        Self::with_collaborators(options, factory, Some(preparation), None).await
    }

    /// Build a pool with every optional collaborator specified explicitly.
    pub async fn with_collaborators(
        options: Options,
        factory: Arc<dyn Factory<T>>,
        preparation: Option<Arc<dyn PreparationStrategy<T>>>,
        metrics: Option<Arc<dyn MetricsSink>>,
    ) -> Result<Self> {
        options.validate()?;
        let preparation_required = preparation.is_some();
        let pool = Self {
            inner: Arc::new(Mutex::new(Inner {
                allocated: 0,
                idle: VecDeque::with_capacity(options.min_size),
                waiters: VecDeque::new(),
                disposed: false,
            })),
            factory,
            preparation: preparation.unwrap_or_else(|| Arc::new(NoopStrategy)),
            preparation_required,
            metrics: metrics.unwrap_or_else(|| Arc::new(NoopSink)),
            options,
        };
        pool.register_observers();
        pool.warm_up().await?;
        Ok(pool)
    }

    fn register_observers(&self) {
        let p = self.clone();
        self.metrics
            .register_items_allocated_observer(Arc::new(move || p.allocated() as f64));
        let p = self.clone();
        self.metrics
            .register_items_available_observer(Arc::new(move || p.available() as f64));
        let p = self.clone();
        self.metrics
            .register_active_leases_observer(Arc::new(move || p.active_leases() as f64));
        let p = self.clone();
        self.metrics
            .register_queued_leases_observer(Arc::new(move || p.queued_leases() as f64));
        let p = self.clone();
        self.metrics
            .register_utilization_rate_observer(Arc::new(move || p.utilization_rate()));
    }

    async fn warm_up(&self) -> Result<()> {
        for _ in 0..self.options.min_size {
            let item = self
                .factory
                .create()
                .await
                .map_err(Error::FactoryFailed)?;
            let mut inner = self.lock();
            inner.allocated += 1;
            inner.idle.push_back(Idle {
                item,
                idle_since: Instant::now(),
            });
        }
        trace!(min_size = self.options.min_size, "pool warmed up");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap()
    }

    // -- Observables ---------------------------------------------------

    /// Number of instances currently owned by the pool (idle + leased).
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.lock().allocated
    }

    /// Number of instances currently sitting in the idle store.
    #[must_use]
    pub fn available(&self) -> usize {
        self.lock().idle.len()
    }

    /// Number of instances currently on loan to a caller.
    #[must_use]
    pub fn active_leases(&self) -> usize {
        let inner = self.lock();
        inner.allocated.saturating_sub(inner.idle.len())
    }

    /// Number of `lease` calls currently parked in the waiter queue.
    ///
    /// A waiter whose `lease` call has already timed out or been cancelled
    /// is not removed from the queue until the next `release` scans past
    /// it, so this counts only senders whose receiver is still live.
    #[must_use]
    pub fn queued_leases(&self) -> usize {
        self.lock().waiters.iter().filter(|tx| !tx.is_canceled()).count()
    }

    /// `active_leases / allocated`, or `0.0` when nothing has been
    /// allocated yet.
    #[must_use]
    pub fn utilization_rate(&self) -> f64 {
        let inner = self.lock();
        if inner.allocated == 0 {
            0.0
        } else {
            inner.allocated.saturating_sub(inner.idle.len()) as f64 / inner.allocated as f64
        }
    }

    /// Whether `dispose` has already been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    // -- Core operations -------------------------------------------------

    /// Lease an instance, waiting if the pool is fully allocated and no
    /// idle instance is available.
    ///
    /// `cancel`, if provided, aborts the wait (and any in-flight
    /// preparation) with [`Error::Cancelled`] when triggered, in addition
    /// to the pool's own `lease_timeout`.
    pub async fn lease(&self, cancel: Option<CancellationToken>) -> Result<T> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        let start = Instant::now();

        if let Some(item) = self.take_idle().await? {
            let item = self.prepare_item(item, cancel.as_ref()).await?;
            self.metrics.record_lease_wait_time(start.elapsed());
            return Ok(item);
        }

        if let Some(item) = self.allocate_new().await? {
            let item = self.prepare_item(item, cancel.as_ref()).await?;
            self.metrics.record_lease_wait_time(start.elapsed());
            return Ok(item);
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.lock();
            if inner.disposed {
                drop(tx);
                return Err(Error::Disposed);
            }
            inner.waiters.push_back(tx);
        }
        trace!("lease parked waiting for an instance");

        let deadline = self.options.lease_timeout.map(|d| Instant::now() + d);
        match wait_for_waiter(rx, deadline, cancel.as_ref()).await {
            Ok(item) => {
                self.metrics.record_lease_wait_time(start.elapsed());
                Ok(item)
            }
            Err(err) => {
                self.metrics.record_lease_exception(&err);
                Err(err)
            }
        }
    }

    /// Pop the oldest live idle instance, opportunistically destroying any
    /// instance found to have outlived `idle_timeout` along the way.
    async fn take_idle(&self) -> Result<Option<T>> {
        let mut evicted = Vec::new();
        let acquired = {
            let mut inner = self.lock();
            if inner.disposed {
                return Err(Error::Disposed);
            }
            let mut got = None;
            while let Some(entry) = inner.idle.pop_front() {
                if let Some(idle_timeout) = self.options.idle_timeout {
                    if entry.idle_since.elapsed() > idle_timeout {
                        inner.allocated = inner.allocated.saturating_sub(1);
                        evicted.push(entry.item);
                        continue;
                    }
                }
                got = Some(entry.item);
                break;
            }
            got
        };
        for item in evicted {
            trace!("evicting idle instance past idle_timeout");
            self.factory.destroy(item).await;
        }
        Ok(acquired)
    }

    /// Reserve an allocation slot and ask the factory for a fresh instance,
    /// if the pool is under `max_size`.
    async fn allocate_new(&self) -> Result<Option<T>> {
        let reserved = {
            let mut inner = self.lock();
            if inner.disposed {
                return Err(Error::Disposed);
            }
            if inner.allocated < self.options.max_size {
                inner.allocated += 1;
                true
            } else {
                false
            }
        };
        if !reserved {
            return Ok(None);
        }
        match self.factory.create().await {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                let mut inner = self.lock();
                inner.allocated = inner.allocated.saturating_sub(1);
                drop(inner);
                let err = Error::FactoryFailed(e);
                self.metrics.record_lease_exception(&err);
                Err(err)
            }
        }
    }

    /// Release a previously leased instance back to the pool.
    ///
    /// Hands off directly to the oldest live waiter if one exists;
    /// otherwise returns the instance to the idle store.
    pub async fn release(&self, item: T, cancel: Option<CancellationToken>) -> Result<()> {
        let Some(mut tx) = self.pop_live_waiter()? else {
            return self.store_idle_or_destroy(item).await;
        };

        let mut item = self.prepare_item(item, cancel.as_ref()).await?;
        loop {
            match tx.send(item) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    trace!("waiter cancelled mid hand-off, trying next");
                    item = returned;
                    match self.pop_live_waiter()? {
                        Some(next) => tx = next,
                        None => return self.store_idle_or_destroy(item).await,
                    }
                }
            }
        }
    }

    /// Dequeue waiters until a live one is found (discarding cancelled
    /// ones), or the queue is exhausted.
    fn pop_live_waiter(&self) -> Result<Option<oneshot::Sender<T>>> {
        let mut inner = self.lock();
        if inner.disposed {
            return Err(Error::Disposed);
        }
        while let Some(tx) = inner.waiters.pop_front() {
            if tx.is_canceled() {
                trace!("purging cancelled waiter during release");
                continue;
            }
            return Ok(Some(tx));
        }
        Ok(None)
    }

    async fn store_idle_or_destroy(&self, item: T) -> Result<()> {
        let mut inner = self.lock();
        if inner.disposed {
            drop(inner);
            self.destroy_and_decrement(item).await;
            return Err(Error::Disposed);
        }
        inner.idle.push_back(Idle {
            item,
            idle_since: Instant::now(),
        });
        Ok(())
    }

    /// Run `is_ready`/`prepare` (if a strategy is configured), destroying
    /// the instance and decrementing `allocated` on failure.
    async fn prepare_item(&self, item: T, cancel: Option<&CancellationToken>) -> Result<T> {
        if !self.preparation_required {
            return Ok(item);
        }
        let mut item = item;
        let deadline = self.options.preparation_timeout.map(|d| Instant::now() + d);
        let start = Instant::now();

        let ready = match with_prep_deadline(self.preparation.is_ready(&item), deadline, cancel).await
        {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "is_ready failed");
                self.metrics.record_preparation_exception(&e);
                self.destroy_and_decrement(item).await;
                return Err(Error::PreparationFailed(e));
            }
        };

        if !ready {
            if let Err(e) =
                with_prep_deadline(self.preparation.prepare(&mut item), deadline, cancel).await
            {
                warn!(error = %e, "prepare failed");
                self.metrics.record_preparation_exception(&e);
                self.destroy_and_decrement(item).await;
                return Err(Error::PreparationFailed(e));
            }
        }

        self.metrics.record_preparation_time(start.elapsed());
        Ok(item)
    }

    async fn destroy_and_decrement(&self, item: T) {
        {
            let mut inner = self.lock();
            inner.allocated = inner.allocated.saturating_sub(1);
        }
        self.factory.destroy(item).await;
    }

    /// Discard every idle instance and recreate `max(queued_leases,
    /// min_size)` fresh ones, funneling each through `release` so pending
    /// waiters are serviced before the idle store is refilled.
    ///
    /// Currently-leased instances are left untouched; this is not a
    /// revocation mechanism.
    pub async fn clear(&self, cancel: Option<CancellationToken>) -> Result<()> {
        let idle_items: Vec<T> = {
            let mut inner = self.lock();
            if inner.disposed {
                return Err(Error::Disposed);
            }
            let items: Vec<T> = inner.idle.drain(..).map(|e| e.item).collect();
            inner.allocated = inner.allocated.saturating_sub(items.len());
            items
        };
        for item in idle_items {
            self.factory.destroy(item).await;
        }

        let need = {
            let inner = self.lock();
            inner.waiters.len().max(self.options.min_size)
        };
        for _ in 0..need {
            {
                let inner = self.lock();
                if inner.disposed {
                    return Err(Error::Disposed);
                }
            }
            let item = self
                .factory
                .create()
                .await
                .map_err(Error::FactoryFailed)?;
            {
                let mut inner = self.lock();
                inner.allocated += 1;
            }
            self.release(item, cancel.clone()).await?;
        }
        debug!("pool cleared");
        Ok(())
    }

    /// One-way transition to disposed: every waiter is settled with
    /// [`Error::Cancelled`], every idle instance is destroyed, and all
    /// subsequent operations fail with [`Error::Disposed`].
    ///
    /// Calling `dispose` more than once is a no-op after the first call.
    pub async fn dispose(&self) {
        let (waiters, idle) = {
            let mut inner = self.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            (
                std::mem::take(&mut inner.waiters),
                std::mem::take(&mut inner.idle),
            )
        };
        // Dropping each sender settles the corresponding `lease` with a
        // cancellation error; no explicit message needs to be sent.
        drop(waiters);
        for entry in idle {
            self.factory.destroy(entry.item).await;
        }
        debug!("pool disposed");
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d.into()).await,
        None => std::future::pending().await,
    }
}

async fn cancelled_opt(token: Option<&CancellationToken>) {
    match token {
        Some(t) => t.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn wait_for_waiter<T>(
    rx: oneshot::Receiver<T>,
    deadline: Option<Instant>,
    cancel: Option<&CancellationToken>,
) -> Result<T> {
    tokio::select! {
        biased;
        res = rx => res.map_err(|_| Error::Cancelled),
        () = sleep_until_opt(deadline) => Err(Error::Cancelled),
        () = cancelled_opt(cancel) => Err(Error::Cancelled),
    }
}

#[derive(Debug)]
struct PreparationTimedOut;

impl fmt::Display for PreparationTimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("preparation timed out")
    }
}

impl std::error::Error for PreparationTimedOut {}

#[derive(Debug)]
struct PreparationCancelled;

impl fmt::Display for PreparationCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("preparation cancelled")
    }
}

impl std::error::Error for PreparationCancelled {}

async fn with_prep_deadline<F, R>(
    fut: F,
    deadline: Option<Instant>,
    cancel: Option<&CancellationToken>,
) -> std::result::Result<R, BoxError>
where
    F: Future<Output = std::result::Result<R, BoxError>>,
{
    tokio::select! {
        biased;
        res = fut => res,
        () = sleep_until_opt(deadline) => Err(Box::new(PreparationTimedOut)),
        () = cancelled_opt(cancel) => Err(Box::new(PreparationCancelled)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::CountingSink;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    // -- A trivial counting factory -------------------------------------

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        destroyed: AtomicUsize,
        fail_next: AtomicUsize,
    }

    impl Factory<u32> for CountingFactory {
        fn create(
            &self,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<u32, BoxError>> + Send + '_>> {
            Box::pin(async move {
                if self.fail_next.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    if n > 0 { Some(n - 1) } else { None }
                }).is_ok()
                {
                    return Err(Box::new(PreparationTimedOut) as BoxError);
                }
                let id = self.created.fetch_add(1, Ordering::SeqCst) as u32;
                Ok(id)
            })
        }

        fn destroy(&self, _item: u32) -> Pin<Box<dyn Future<Output = ()> + Send>> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    fn opts(min: usize, max: usize) -> Options {
        Options::new().with_min_size(min).with_max_size(max)
    }

    // -- §8 property 2: min-size warmup ----------------------------------

    #[tokio::test]
    async fn warms_up_to_min_size() {
        let pool = Pool::new(opts(3, 5), Arc::new(CountingFactory::default()))
            .await
            .unwrap();
        assert_eq!(pool.allocated(), 3);
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.active_leases(), 0);
    }

    // -- §8.1 size bound + S1 --------------------------------------------

    #[tokio::test]
    async fn s1_single_slot_handoff() {
        let pool = Pool::new(opts(1, 1), Arc::new(CountingFactory::default()))
            .await
            .unwrap();

        let a = pool.lease(None).await.unwrap();

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.lease(None).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.release(a, None).await.unwrap();

        let b = waiter.await.unwrap().unwrap();
        assert_eq!(b, 0); // same instance handed back (single slot)

        assert_eq!(pool.active_leases(), 1);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.queued_leases(), 0);
    }

    // -- S2: lease timeout while pool exhausted --------------------------

    #[tokio::test]
    async fn s2_lease_times_out_when_exhausted() {
        let options = opts(0, 2).with_lease_timeout(Duration::from_millis(10));
        let pool = Pool::new(options, Arc::new(CountingFactory::default()))
            .await
            .unwrap();

        let _a = pool.lease(None).await.unwrap();
        let _b = pool.lease(None).await.unwrap();

        let err = pool.lease(None).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(pool.active_leases(), 2);
        assert_eq!(pool.queued_leases(), 0);
    }

    // -- §8 property 5: FIFO among live waiters --------------------------

    #[tokio::test]
    async fn waiters_are_served_fifo() {
        let pool = Pool::new(opts(0, 1), Arc::new(CountingFactory::default()))
            .await
            .unwrap();

        let a = pool.lease(None).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));

        let (p1, o1) = (pool.clone(), Arc::clone(&order));
        let w1 = tokio::spawn(async move {
            let item = p1.lease(None).await.unwrap();
            o1.lock().unwrap().push(1);
            item
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (p2, o2) = (pool.clone(), Arc::clone(&order));
        let w2 = tokio::spawn(async move {
            let item = p2.lease(None).await.unwrap();
            o2.lock().unwrap().push(2);
            item
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        pool.release(a, None).await.unwrap();
        let b = w1.await.unwrap();
        pool.release(b, None).await.unwrap();
        let _c = w2.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    // -- §8 property 6: cancellation releases the queue slot -------------

    #[tokio::test]
    async fn cancellation_releases_queue_slot() {
        let pool = Pool::new(opts(0, 1), Arc::new(CountingFactory::default()))
            .await
            .unwrap();

        let a = pool.lease(None).await.unwrap();

        let token = CancellationToken::new();
        let pool2 = pool.clone();
        let token2 = token.clone();
        let waiter = tokio::spawn(async move { pool2.lease(Some(token2)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.queued_leases(), 1);

        token.cancel();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.queued_leases(), 0);

        // the instance was never delivered to the cancelled waiter, so a
        // fresh lease should still observe it.
        pool.release(a, None).await.unwrap();
        let reused = pool.lease(None).await.unwrap();
        assert_eq!(reused, 0);
    }

    // -- §8 property 7: preparation correctness --------------------------

    struct FlakyThenReady {
        first_call: AtomicU32,
        prepare_calls: AtomicUsize,
    }

    impl Default for FlakyThenReady {
        fn default() -> Self {
            Self {
                first_call: AtomicU32::new(1),
                prepare_calls: AtomicUsize::new(0),
            }
        }
    }

    impl PreparationStrategy<u32> for FlakyThenReady {
        fn is_ready<'a>(
            &'a self,
            _item: &'a u32,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<bool, BoxError>> + Send + 'a>>
        {
            Box::pin(async move {
                let first = self.first_call.swap(0, Ordering::SeqCst);
                Ok(first == 0)
            })
        }

        fn prepare<'a>(
            &'a self,
            item: &'a mut u32,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<(), BoxError>> + Send + 'a>>
        {
            self.prepare_calls.fetch_add(1, Ordering::SeqCst);
            *item += 1000;
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn prepares_exactly_once_when_not_ready() {
        let strategy = Arc::new(FlakyThenReady::default());
        let pool = Pool::with_preparation(
            opts(0, 1),
            Arc::new(CountingFactory::default()),
            strategy.clone(),
        )
        .await
        .unwrap();

        let item = pool.lease(None).await.unwrap();
        assert_eq!(item, 1000, "prepare should have marked the instance ready");
        assert_eq!(strategy.prepare_calls.load(Ordering::SeqCst), 1);
    }

    // -- §8 property 8: idle eviction -------------------------------------

    #[tokio::test]
    async fn idle_timeout_evicts_and_replaces() {
        let options = opts(0, 2).with_idle_timeout(Duration::from_millis(1));
        let factory = Arc::new(CountingFactory::default());
        let pool = Pool::new(options, factory.clone()).await.unwrap();

        let a = pool.lease(None).await.unwrap();
        pool.release(a, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let b = pool.lease(None).await.unwrap();
        assert_ne!(a, b, "a fresh instance should have been created");
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);
    }

    // -- §8 property 9 + S6: dispose idempotence and safety ---------------

    #[tokio::test]
    async fn dispose_is_idempotent_and_cancels_waiters() {
        let factory = Arc::new(CountingFactory::default());
        let pool = Pool::new(opts(0, 1), factory.clone()).await.unwrap();

        let _a = pool.lease(None).await.unwrap();

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.lease(None).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        pool.dispose().await;
        pool.dispose().await; // idempotent, must not panic or double-destroy

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());

        assert!(matches!(pool.lease(None).await, Err(Error::Disposed)));
        assert!(matches!(pool.release(0, None).await, Err(Error::Disposed)));
        assert!(matches!(pool.clear(None).await, Err(Error::Disposed)));
    }

    // -- §8 property 4: no leak across matched lease/release pairs -------

    #[tokio::test]
    async fn no_leak_after_matched_pairs() {
        let pool = Pool::new(opts(0, 4), Arc::new(CountingFactory::default()))
            .await
            .unwrap();

        for _ in 0..20 {
            let item = pool.lease(None).await.unwrap();
            pool.release(item, None).await.unwrap();
        }

        assert_eq!(pool.active_leases(), 0);
        assert!(pool.allocated() <= 4);
        assert_eq!(pool.available(), pool.allocated());
    }

    // -- factory failure does not leak the allocation slot ---------------

    #[tokio::test]
    async fn factory_failure_rolls_back_allocated() {
        let factory = Arc::new(CountingFactory::default());
        factory.fail_next.store(1, Ordering::SeqCst);
        let pool = Pool::new(opts(0, 1), factory.clone()).await.unwrap();

        let err = pool.lease(None).await.unwrap_err();
        assert!(matches!(err, Error::FactoryFailed(_)));
        assert_eq!(pool.allocated(), 0);

        let item = pool.lease(None).await.unwrap();
        assert_eq!(item, 0);
    }

    // -- metrics observers report current snapshots ----------------------

    #[tokio::test]
    async fn metrics_observers_read_live_state() {
        let sink = Arc::new(CountingSink::default());
        let pool = Pool::with_collaborators(
            opts(0, 2),
            Arc::new(CountingFactory::default()),
            None,
            Some(sink.clone() as Arc<dyn MetricsSink>),
        )
        .await
        .unwrap();

        let _item = pool.lease(None).await.unwrap();
        assert_eq!(sink.lease_waits.load(Ordering::SeqCst), 1);

        let samplers = sink.allocated_samplers.lock().unwrap();
        assert_eq!(samplers.len(), 1);
        assert_eq!((samplers[0])(), 1.0);
    }

    // -- clear funnels new instances to waiters first ---------------------

    #[tokio::test]
    async fn clear_services_waiters_before_idle_store() {
        let pool = Pool::new(opts(1, 1), Arc::new(CountingFactory::default()))
            .await
            .unwrap();

        let a = pool.lease(None).await.unwrap();
        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.lease(None).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.queued_leases(), 1);

        pool.clear(None).await.unwrap();
        let _ = waiter.await.unwrap().unwrap();
        drop(a);

        assert_eq!(pool.queued_leases(), 0);
    }
}
