//! Background Expiration Sweeper
//!
//! Lazy expiry (checking on access) leaves a gap: a key that expires and
//! is never read again would stay in memory forever. The sweeper closes
//! it by periodically purging every keyspace in the registry.
//!
//! The sweeper runs as a Tokio task:
//! 1. Sleep for the configured interval (default: 1 second)
//! 2. Purge expired keys from every registered keyspace
//! 3. Log how many keys were removed
//!
//! Purging collects the expired keys from a keyspace under its lock and
//! removes them in the same critical section, so concurrent inserts and
//! reads are never iterated over a stale view.

use crate::storage::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// How often the sweeper wakes by default.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A handle to the running sweeper.
///
/// Dropping the handle stops the background task.
#[derive(Debug)]
pub struct Sweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl Sweeper {
    /// Starts the sweeper as a background task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use reddb::storage::{Registry, Sweeper, DEFAULT_SWEEP_INTERVAL};
    /// use std::sync::Arc;
    ///
    /// let registry = Arc::new(Registry::new());
    /// let sweeper = Sweeper::start(Arc::clone(&registry), DEFAULT_SWEEP_INTERVAL);
    ///
    /// // Sweeper runs in the background; dropping the handle stops it.
    /// drop(sweeper);
    /// ```
    pub fn start(registry: Arc<Registry>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(registry, interval, shutdown_rx));

        info!("Background expiration sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper.
    ///
    /// Called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background expiration sweeper stopped");
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    registry: Arc<Registry>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiration sweeper received shutdown signal");
                    return;
                }
            }
        }

        let mut removed = 0;
        for keyspace in registry.all() {
            let purged = keyspace.purge_expired();
            if purged > 0 {
                debug!(db = keyspace.id(), purged, "Expired keys removed");
            }
            removed += purged;
        }

        if removed > 0 {
            debug!(removed, "Sweep pass complete");
        }
    }
}

/// Starts the sweeper with the default interval.
pub fn start_sweeper(registry: Arc<Registry>) -> Sweeper {
    Sweeper::start(registry, DEFAULT_SWEEP_INTERVAL)
}
