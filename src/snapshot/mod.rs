//! Snapshot Subsystem
//!
//! Persistence is snapshot-only: DUMP serializes one keyspace to a
//! self-describing JSON file, LOAD restores one, and TIME_DUMP keeps a
//! background task writing one snapshot per database on an interval.
//! There is no crash durability; a snapshot exists only when a command
//! or the timer produced it.
//!
//! ## Modules
//!
//! - `file`: the on-disk format, dump/load, filename builders
//! - `timed`: the periodic dump task
//!
//! Restored TTLs are re-based on the load time: a key dumped with 40
//! seconds left gets a fresh deadline 40 seconds after the LOAD.

pub mod file;
pub mod timed;

// Re-export commonly used types
pub use file::{
    auto_dump_path, dump_keyspace, dump_path, load_keyspace, LoadReport, Snapshot, SnapshotError,
};
pub use timed::TimedDumper;
