//! No-database stand-in for [`super::DatabasePool`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::LobbyError;

/// Pool that never opens a connection.
///
/// Selected with `--nodb`. It honours the same open/closed lifecycle as
/// the real pools so teardown can be exercised without a database.
#[derive(Debug, Clone)]
pub struct MockPool {
    closed: Arc<AtomicBool>,
    max_connections: u32,
}

impl MockPool {
    /// Creates an open mock pool.
    #[must_use]
    pub fn new(max_connections: u32) -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            max_connections,
        }
    }

    /// Configured pool bound; informational only.
    #[must_use]
    pub const fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Always zero: the mock holds no connections.
    #[must_use]
    pub const fn size(&self) -> u32 {
        0
    }

    /// Succeeds until the pool is closed.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Database`] with [`sqlx::Error::PoolClosed`]
    /// after [`MockPool::close`].
    pub fn ping(&self) -> Result<(), LobbyError> {
        if self.is_closed() {
            return Err(LobbyError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    /// Marks the pool closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns `true` after [`MockPool::close`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_closed_state() {
        let pool = MockPool::new(10);
        let clone = pool.clone();
        assert!(clone.ping().is_ok());
        pool.close();
        assert!(clone.is_closed());
        assert!(clone.ping().is_err());
        assert_eq!(clone.max_connections(), 10);
    }
}
