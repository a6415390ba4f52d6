//! Connection Management
//!
//! Every accepted client gets its own async task running a
//! read-parse-execute-respond loop. Responses on one connection are
//! emitted in request order; no ordering holds across connections.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                      (main.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + semaphore permit
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  Session { authenticated, current_db }                      │
//! │                                                             │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │ Read bytes  │──>│ Parse frame │──>│ Execute cmd │        │
//! │  └─────────────┘   └─────────────┘   └──────┬──────┘        │
//! │                                             ▼               │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send frame  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The handler owns its session; nothing about authentication or the
//! selected database survives the connection.

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
