//! Periodic Snapshot Task
//!
//! TIME_DUMP starts a background task that snapshots every registered
//! database on a fixed interval, using auto-generated filenames. Each
//! tick reads the registry fresh, so databases created after the task
//! started are included.
//!
//! A failed dump is logged and skipped; the task keeps running until it
//! is stopped or replaced. Dropping the handle stops the task.

use crate::snapshot::file::{auto_dump_path, dump_keyspace};
use crate::storage::Registry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A handle to the running periodic dumper.
///
/// Dropping the handle stops the background task.
#[derive(Debug)]
pub struct TimedDumper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    /// Seconds between dump passes
    interval: Duration,
}

impl TimedDumper {
    /// Starts the periodic dumper as a background task.
    ///
    /// Every `interval`, one snapshot per registered database is written
    /// into `out_dir` under an auto-generated name.
    pub fn start(registry: Arc<Registry>, interval: Duration, out_dir: PathBuf) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(dump_loop(registry, interval, out_dir, shutdown_rx));

        info!(interval_secs = interval.as_secs(), "Periodic dump started");

        Self {
            shutdown_tx,
            interval,
        }
    }

    /// Seconds between dump passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stops the dumper.
    ///
    /// Called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Periodic dump stopped");
    }
}

impl Drop for TimedDumper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main dump loop.
async fn dump_loop(
    registry: Arc<Registry>,
    interval: Duration,
    out_dir: PathBuf,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Periodic dumper received shutdown signal");
                    return;
                }
            }
        }

        for keyspace in registry.all() {
            let path = auto_dump_path(&out_dir, keyspace.id());
            match dump_keyspace(&keyspace, &path) {
                Ok(()) => info!(file = %path.display(), "Auto-dump completed"),
                Err(e) => warn!(db = keyspace.id(), error = %e, "Auto-dump failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TtlUpdate;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "reddb_timed_{}_{}",
            std::process::id(),
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn auto_dumps(dir: &PathBuf, id: u64) -> usize {
        let prefix = format!("reddb_auto_dump_db{}_", id);
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .count()
    }

    #[tokio::test]
    async fn test_periodic_dumps_every_database() {
        let dir = scratch_dir("every");
        let registry = Arc::new(Registry::new());
        registry.get(0).unwrap().set("k", "v", TtlUpdate::Keep);
        registry.create(Some(1)).unwrap();

        let dumper =
            TimedDumper::start(Arc::clone(&registry), Duration::from_millis(30), dir.clone());

        tokio::time::sleep(Duration::from_millis(120)).await;
        drop(dumper);

        assert!(auto_dumps(&dir, 0) >= 1);
        assert!(auto_dumps(&dir, 1) >= 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_databases_created_later_are_included() {
        let dir = scratch_dir("later");
        let registry = Arc::new(Registry::new());

        let dumper =
            TimedDumper::start(Arc::clone(&registry), Duration::from_millis(30), dir.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.create(Some(7)).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        drop(dumper);

        assert!(auto_dumps(&dir, 7) >= 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_stop_halts_dumping() {
        let dir = scratch_dir("stop");
        let registry = Arc::new(Registry::new());

        let dumper =
            TimedDumper::start(Arc::clone(&registry), Duration::from_millis(20), dir.clone());
        tokio::time::sleep(Duration::from_millis(70)).await;
        drop(dumper);

        let after_stop = auto_dumps(&dir, 0);
        assert!(after_stop >= 1);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(auto_dumps(&dir, 0), after_stop);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
