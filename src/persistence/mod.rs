//! Persistence layer: the shared database pool.
//!
//! [`DatabasePool`] wraps a `sqlx` pool for the selected driver, or a
//! [`MockPool`] when the server runs with `--nodb`. Queries against the
//! lobby schema belong to the services, not to this module.

pub mod mock;
pub mod pool;

pub use mock::MockPool;
pub use pool::{DatabaseMode, DatabasePool, DbDriver};
