//! Wire Protocol Implementation
//!
//! RedDB speaks a RESP-inspired, length-prefixed, type-tagged framing.
//! Requests arrive as `*` arrays of `$` bulk strings (one per token) and
//! every command produces exactly one response frame.
//!
//! ## Modules
//!
//! - `types`: the `Value` enum and frame serialization
//! - `parser`: incremental decoder for incoming bytes
//!
//! ## Example
//!
//! ```ignore
//! use reddb::protocol::{parse_frame, Value};
//! use bytes::Bytes;
//!
//! // Decoding an incoming request
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (value, consumed) = parse_frame(data).unwrap().unwrap();
//!
//! // Encoding a response
//! let response = Value::bulk_string(Bytes::from("hello"));
//! let bytes = response.serialize();
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_frame, FrameParser, ParseError, ParseResult};
pub use types::Value;
