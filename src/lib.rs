//! # RedDB - An In-Memory Multi-Database Key-Value Store
//!
//! RedDB is a TCP key-value server with several independent logical
//! databases, per-key TTL expiry, and on-demand JSON snapshots. Clients
//! speak a RESP-inspired, length-prefixed wire protocol over a long-lived
//! connection, optionally authenticate, select a database, and issue
//! commands against string keys and values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               RedDB                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                     ┌──────┴──────┐           ▼                         │
//! │                     │   Frame     │    ┌──────────────────────────────┐ │
//! │                     │   Parser    │    │          Registry            │ │
//! │                     └─────────────┘    │  ┌────────┐ ┌────────┐       │ │
//! │                                        │  │ DB 0   │ │ DB n   │ ...   │ │
//! │                                        │  │ kv+ttl │ │ kv+ttl │       │ │
//! │                                        │  └────────┘ └────────┘       │ │
//! │                                        └──────────────────────────────┘ │
//! │                                               ▲            ▲            │
//! │                                               │            │            │
//! │                     ┌─────────────────────────┴──┐  ┌──────┴──────────┐ │
//! │                     │         Sweeper            │  │  TimedDumper    │ │
//! │                     │   (Background Tokio Task)  │  │  (TIME_DUMP)    │ │
//! │                     └────────────────────────────┘  └─────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Session
//! - `AUTH password` / `SET_PASSWORD new_password`
//! - `SELECT id`
//!
//! ### Database Management
//! - `NEW_DB [id]` / `LIST_DBS` / `DROP_DB id`
//!
//! ### Data
//! - `GET key` (plus `GET *` for all values, `GET **` for all pairs)
//! - `SET key value [ttl_seconds]`
//! - `DELETE key` / `EXISTS key` / `DEL_TIME key`
//! - `BULK_GET key [key ...]` / `BULK_SET key value [key value ...]`
//!
//! ### Persistence
//! - `FLUSH [password]`
//! - `DUMP [password] [filename]` / `LOAD [password] filename`
//! - `TIME_DUMP interval_seconds`
//!
//! ## Module Overview
//!
//! - [`protocol`]: wire frame types and the incremental parser
//! - [`storage`]: keyspaces, the registry, and the expiration sweeper
//! - [`snapshot`]: the dump file format and the periodic dump task
//! - [`commands`]: command dispatch, sessions, and authentication
//! - [`connection`]: per-client connection loops
//!
//! ## Design Highlights
//!
//! ### One Lock per Database
//!
//! Each keyspace guards its value map and its deadline map with a single
//! `RwLock`, which makes every command, including the bulk ones, atomic
//! with respect to that database. Databases never contend with each
//! other.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with a TTL are expired in two ways:
//! 1. **Lazy**: every read checks the deadline and evicts on the spot
//! 2. **Active**: a background task sweeps all databases once a second
//!
//! Lazy expiry is the correctness mechanism; the sweeper reclaims memory
//! for keys that are never read again.
//!
//! ### Snapshot-Only Persistence
//!
//! DUMP writes one self-describing JSON file per database, storing
//! remaining TTLs rather than absolute deadlines so a restored key keeps
//! its remaining lifetime. There is no crash durability.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod snapshot;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Session};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{FrameParser, ParseError, Value};
pub use snapshot::{SnapshotError, TimedDumper};
pub use storage::{start_sweeper, Keyspace, Registry, Sweeper, TtlUpdate};

/// The default port RedDB listens on
pub const DEFAULT_PORT: u16 = 7100;

/// The default host RedDB binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default cap on concurrent client connections
pub const DEFAULT_MAX_CLIENTS: usize = 64;

/// Version of RedDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
