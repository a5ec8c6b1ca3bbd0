//! The optional verify-and-initialize step applied before an instance is
//! handed to a caller.

use std::future::Future;
use std::pin::Pin;

use crate::error::BoxError;

/// Checks whether a pooled instance is ready for use, and brings it to a
/// ready state if it is not.
///
/// `is_ready` should be cheap (a protocol no-op, a liveness ping);
/// `prepare` may be expensive (connect + authenticate). The pool calls
/// `prepare` only when `is_ready` returns `false`.
pub trait PreparationStrategy<T>: Send + Sync {
    /// Cheap liveness check.
    fn is_ready<'a>(&'a self, item: &'a T) -> Pin<Box<dyn Future<Output = Result<bool, BoxError>> + Send + 'a>>;

    /// Heavyweight initialization, run only when `is_ready` returned `false`.
    fn prepare<'a>(&'a self, item: &'a mut T) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>>;
}

/// A strategy that considers every instance immediately ready. Equivalent to
/// having no preparation strategy configured at all; kept as an explicit
/// type so callers can opt in to the "always ready" behavior without special
/// casing `Option<Arc<dyn PreparationStrategy<T>>>` at call sites.
pub struct NoopStrategy;

impl<T: Send + Sync> PreparationStrategy<T> for NoopStrategy {
    fn is_ready<'a>(&'a self, _item: &'a T) -> Pin<Box<dyn Future<Output = Result<bool, BoxError>> + Send + 'a>> {
        Box::pin(async { Ok(true) })
    }

    fn prepare<'a>(&'a self, _item: &'a mut T) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}
