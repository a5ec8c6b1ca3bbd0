//! Immutable pool configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for a [`Pool`](crate::Pool).
///
/// Constructed with [`Options::new`] or [`Default::default`], then validated
/// (see [`Options::validate`]) by the pool at construction time; an invalid
/// `Options` never produces a pool.
#[derive(Debug, Clone)]
pub struct Options {
    /// Number of instances pre-created at construction and after `clear`.
    pub min_size: usize,
    /// Hard cap on the number of instances the pool will ever allocate at
    /// once (idle + leased).
    pub max_size: usize,
    /// Bound on how long a `lease` call will wait for an instance to become
    /// available. `None` means wait forever.
    pub lease_timeout: Option<Duration>,
    /// Bound on how long preparation (`is_ready` + `prepare`) may take.
    /// `None` means wait forever.
    pub preparation_timeout: Option<Duration>,
    /// How long an instance may sit idle before it is evicted the next time
    /// it would be leased. `None` means idle instances never expire.
    pub idle_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: usize::MAX,
            lease_timeout: None,
            preparation_timeout: None,
            idle_timeout: None,
        }
    }
}

impl Options {
    /// Start from the defaults (`min_size: 0`, `max_size: usize::MAX`, every
    /// timeout infinite) and override fields with the builder methods below.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_preparation_timeout(mut self, timeout: Duration) -> Self {
        self.preparation_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Reject configurations the pool core cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidArgument(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(Error::InvalidArgument(format!(
                "min_size ({}) must not exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }
}
