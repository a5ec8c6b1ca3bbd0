//! `leasepool`, a generic, concurrent object pool for expensive-to-construct,
//! reusable resources (database connections, HTTP/2 sessions, worker
//! processes, ...).
//!
//! A [`Pool<T>`] owns up to `max_size` instances of `T`, built on demand by a
//! [`Factory<T>`] and optionally brought back to a ready state before each
//! lease by a [`PreparationStrategy<T>`]. Callers obtain an instance with
//! [`Pool::lease`] and give it back with [`Pool::release`]; there is no RAII
//! handle that auto-returns on drop (doing so is left to a thin wrapper
//! built on top of this crate, since it is a convenience, not a core
//! correctness property).
//!
//! ```no_run
//! use std::sync::Arc;
//! use leasepool::{Factory, Options, Pool};
//!
//! # type BoxError = Box<dyn std::error::Error + Send + Sync>;
//! struct Connection(u32);
//!
//! struct ConnectionFactory;
//!
//! impl Factory<Connection> for ConnectionFactory {
//!     fn create(
//!         &self,
//!     ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Connection, BoxError>> + Send + '_>> {
//!         Box::pin(async { Ok(Connection(0)) })
//!     }
//! }
//!
//! # async fn run() -> leasepool::Result<()> {
//! let pool = Pool::new(Options::new().with_max_size(10), Arc::new(ConnectionFactory)).await?;
//! let conn = pool.lease(None).await?;
//! pool.release(conn, None).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod factory;
mod metrics;
mod options;
mod pool;
mod prepare;

pub use error::{BoxError, Error, Result};
pub use factory::{FnFactory, Factory};
pub use metrics::{MetricsSink, NoopSink, Sampler};
pub use options::Options;
pub use pool::Pool;
pub use prepare::{NoopStrategy, PreparationStrategy};

pub use tokio_util::sync::CancellationToken;
