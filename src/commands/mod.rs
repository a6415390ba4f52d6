//! Command Processing Layer
//!
//! Decoded request frames flow through here on their way to the storage
//! layer:
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame Parser   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Tokenize     │
//! │  - Auth gate    │
//! │  - Route        │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Registry /      │  (storage + snapshot modules)
//! │ Keyspace /      │
//! │ Snapshots       │
//! └─────────────────┘
//! ```
//!
//! The handler also owns the per-connection [`Session`]: the
//! authenticated flag and the currently selected database id.

pub mod handler;

// Re-export the main command handler
pub use handler::{CommandHandler, Session};
