//! Snapshot File Format
//!
//! A snapshot is a single self-describing JSON object:
//!
//! ```json
//! {
//!   "database_id": 0,
//!   "data": { "key": "value" },
//!   "ttl": { "key": 42.5 },
//!   "timestamp": 1700000000.0
//! }
//! ```
//!
//! `ttl` holds remaining seconds (not absolute deadlines), so a snapshot
//! restored on another machine or after a restart keeps its expiry
//! semantics. Keys absent from `ttl` are restored without a deadline.
//!
//! Loading is lenient the same way the dump files are forgiving to edit
//! by hand: `ttl` and `database_id` are optional, and a malformed TTL
//! entry is skipped while its key is still loaded.

use crate::storage::Keyspace;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors from dumping or loading a snapshot. For load failures the
/// display strings are the exact messages sent to clients.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in dump file: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Invalid dump file format: {0}")]
    InvalidFormat(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The on-disk shape of a dump.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    /// Id of the database the snapshot was taken from
    pub database_id: u64,
    /// key -> value
    pub data: BTreeMap<String, String>,
    /// key -> remaining TTL in seconds; subset of `data`'s keys
    pub ttl: BTreeMap<String, f64>,
    /// Seconds since the epoch at dump time, informational
    pub timestamp: f64,
}

/// What a load did: how many values it discarded, how many it inserted,
/// and the database id recorded in the file (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub replaced: usize,
    pub loaded: usize,
    pub source_db: Option<u64>,
}

/// Current time as whole seconds since the epoch, for filenames.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Current time as fractional seconds since the epoch.
fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Default filename for a manual DUMP of database `id`.
pub fn dump_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("reddb_dump_db{}_{}.json", id, unix_now()))
}

/// Filename for a periodic auto-dump of database `id`.
pub fn auto_dump_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("reddb_auto_dump_db{}_{}.json", id, unix_now()))
}

/// Writes a snapshot of the keyspace to `path`.
///
/// Expired entries are filtered out; keys with a deadline store their
/// remaining TTL. The contents are copied under the keyspace lock and
/// the file is written without holding it.
pub fn dump_keyspace(keyspace: &Keyspace, path: &Path) -> Result<(), SnapshotError> {
    let (data, ttl) = keyspace.export();

    let snapshot = Snapshot {
        database_id: keyspace.id(),
        data,
        ttl,
        timestamp: epoch_secs(),
    };

    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot).map_err(std::io::Error::from)?;
    Ok(())
}

/// Replaces the keyspace contents with the snapshot at `path`.
///
/// The file must be a JSON object with a `data` object field. For each
/// restored key, a positive remaining TTL becomes a fresh deadline;
/// malformed TTL entries are skipped silently and the key is loaded
/// without one.
pub fn load_keyspace(keyspace: &Keyspace, path: &Path) -> Result<LoadReport, SnapshotError> {
    if !path.exists() {
        return Err(SnapshotError::FileNotFound(path.display().to_string()));
    }

    let text = std::fs::read_to_string(path)?;
    let root: serde_json::Value =
        serde_json::from_str(&text).map_err(SnapshotError::InvalidJson)?;

    let object = root
        .as_object()
        .ok_or(SnapshotError::InvalidFormat("root must be object"))?;
    let data = object
        .get("data")
        .ok_or(SnapshotError::InvalidFormat("missing 'data' field"))?
        .as_object()
        .ok_or(SnapshotError::InvalidFormat("'data' must be an object"))?;
    let ttls = object.get("ttl").and_then(|value| value.as_object());

    let mut entries = Vec::with_capacity(data.len());
    for (key, value) in data {
        // Our own dumps only ever hold strings; anything else a hand
        // edit put there is kept in its JSON text form.
        let value = match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        };
        let remaining = ttls
            .and_then(|map| map.get(key))
            .and_then(|value| value.as_f64());
        entries.push((key.clone(), value, remaining));
    }

    let (replaced, loaded) = keyspace.restore(entries);
    let source_db = object.get("database_id").and_then(|value| value.as_u64());

    Ok(LoadReport {
        replaced,
        loaded,
        source_db,
    })
}
