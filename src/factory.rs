//! The collaborator that constructs and tears down pooled instances.

use std::future::Future;
use std::pin::Pin;

use crate::error::BoxError;

/// Constructs fresh instances of the pooled resource, and tears them down
/// when the pool is done with one.
///
/// `create` must not block on the executor thread; it should do any network
/// or I/O work behind `.await`. `destroy` is infallible from the pool's
/// point of view, a failing teardown is logged, never propagated.
pub trait Factory<T>: Send + Sync {
    /// Produce a brand-new instance.
    fn create(&self) -> Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send + '_>>;

    /// Permanently destroy an instance the pool no longer wants (evicted,
    /// cleared, disposed, or failed preparation). The default does nothing,
    /// appropriate for resources with no explicit teardown (e.g. `Drop`
    /// already handles it).
    fn destroy(&self, _item: T) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async {})
    }
}

/// A [`Factory`] built from a closure, for resources that need nothing more
/// than a constructor.
pub struct FnFactory<F> {
    create: F,
}

impl<F> FnFactory<F> {
    pub fn new(create: F) -> Self {
        Self { create }
    }
}

impl<T, F, Fut> Factory<T> for FnFactory<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Send,
{
    fn create(&self) -> Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send + '_>> {
        Box::pin((self.create)())
    }
}
