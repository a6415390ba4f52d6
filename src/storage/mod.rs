//! Storage Layer
//!
//! The storage layer is a set of independent logical databases
//! ("keyspaces") managed by a registry, plus the background task that
//! reclaims expired keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Registry                             │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────┐                  │
//! │  │ Keyspace 0│ │ Keyspace 1│ │ Keyspace N│                  │
//! │  │ RwLock    │ │ RwLock    │ │ RwLock    │                  │
//! │  │ kv + ttl  │ │ kv + ttl  │ │ kv + ttl  │                  │
//! │  └───────────┘ └───────────┘ └───────────┘                  │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │         Sweeper           │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! Each keyspace guards its value map and its deadline map with one
//! lock, so single and bulk operations are atomic per database. The
//! registry hands keyspaces out as `Arc`s; a dropped database stays
//! usable for commands that already resolved it.
//!
//! ## Example
//!
//! ```
//! use reddb::storage::{Registry, TtlUpdate};
//!
//! let registry = Registry::new();
//!
//! let db = registry.get(0).unwrap();
//! db.set("name", "reddb", TtlUpdate::Keep);
//! assert_eq!(db.get("name"), Some("reddb".to_string()));
//!
//! // Keys can carry a TTL in seconds
//! db.set("session", "token123", TtlUpdate::ExpireIn(3600));
//! ```

pub mod expiry;
pub mod keyspace;
pub mod registry;

// Re-export commonly used types
pub use expiry::{start_sweeper, Sweeper, DEFAULT_SWEEP_INTERVAL};
pub use keyspace::{Keyspace, TtlUpdate};
pub use registry::{Registry, RegistryError};
