//! Error taxonomy for pool operations.

use std::error::Error as StdError;

use thiserror::Error;

/// A boxed, type-erased error from a user-supplied collaborator (factory or
/// preparation strategy).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a pool operation can fail with.
///
/// Nothing in this crate retries automatically; every variant is surfaced to
/// the caller, who decides whether and how to retry.
#[derive(Debug, Error)]
pub enum Error {
    /// The pool has been disposed; no further leases, releases, or clears
    /// will succeed.
    #[error("pool is disposed")]
    Disposed,

    /// The caller's cancellation signal fired, or `lease_timeout` /
    /// `preparation_timeout` elapsed, while waiting.
    #[error("operation cancelled")]
    Cancelled,

    /// The item factory failed to produce a new instance.
    #[error("factory failed to create instance")]
    FactoryFailed(#[source] BoxError),

    /// `is_ready` or `prepare` failed (or timed out); the instance has been
    /// destroyed and will not be returned to the idle store.
    #[error("preparation failed")]
    PreparationFailed(#[source] BoxError),

    /// The pool was constructed with an inconsistent `Options` value.
    #[error("invalid pool configuration: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// True for `Cancelled`, the only variant callers commonly want to treat
    /// as "try again later" rather than "this pool is broken".
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True once the pool is known to be permanently unusable.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Error::Disposed)
    }
}
