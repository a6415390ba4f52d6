//! Wire Protocol Values
//!
//! Every frame on the wire starts with a single tag byte that selects
//! the type, followed by a CRLF-terminated payload:
//!
//! | tag | type          | encoding                                  |
//! |-----|---------------|-------------------------------------------|
//! | `+` | simple string | `+<text>\r\n`                             |
//! | `-` | error         | `-<text>\r\n`                             |
//! | `:` | integer       | `:<decimal>\r\n`                          |
//! | `$` | bulk string   | `$<len>\r\n<len bytes>\r\n` (`$-1` null)  |
//! | `*` | array         | `*<n>\r\n` + n nested frames              |
//! | `%` | map           | `%<n>\r\n` + 2n nested frames (k,v pairs) |
//!
//! Bulk strings are the workhorse: requests arrive as `*` arrays of `$`
//! tokens, and keys and values travel as `$` frames. Simple strings are
//! reserved for the short `+OK` acknowledgements.

use bytes::Bytes;

/// The CRLF terminator used by the wire protocol
pub const CRLF: &[u8] = b"\r\n";

/// Frame type tag bytes
pub mod tag {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
    pub const MAP: u8 = b'%';
}

/// A single value on the wire, for both requests and responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `+<text>\r\n`; must not contain CRLF itself
    SimpleString(String),

    /// `-<message>\r\n`; how command and protocol failures surface
    Error(String),

    /// `:<decimal>\r\n`, 64-bit signed
    Integer(i64),

    /// `$<len>\r\n<bytes>\r\n`, binary safe
    BulkString(Bytes),

    /// Absent value, written as the null bulk string `$-1\r\n`
    Null,

    /// `*<n>\r\n` followed by n nested frames
    Array(Vec<Value>),

    /// `%<n>\r\n` followed by n key frames interleaved with n value
    /// frames; pair order is preserved
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Error response carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    /// Integer response.
    pub fn integer(n: i64) -> Self {
        Value::Integer(n)
    }

    /// Bulk string response.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        Value::BulkString(data.into())
    }

    /// Null response.
    pub fn null() -> Self {
        Value::Null
    }

    /// Array response.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(items)
    }

    /// Map response from ordered pairs.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        Value::Map(pairs)
    }

    /// The `+OK` acknowledgement AUTH and SELECT answer with.
    pub fn ok() -> Self {
        Value::SimpleString("OK".into())
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The text of a simple or bulk string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::SimpleString(text) => Some(text),
            Value::BulkString(raw) => std::str::from_utf8(raw).ok(),
            _ => None,
        }
    }

    /// Encodes this value as a standalone byte buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize_into(&mut out);
        out
    }

    /// Encodes this value onto the end of `out`, recursing through
    /// collections. Reusing one buffer across responses avoids a fresh
    /// allocation per frame.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::SimpleString(text) => put_line(out, tag::SIMPLE_STRING, text),
            Value::Error(message) => put_line(out, tag::ERROR, message),
            Value::Integer(n) => put_line(out, tag::INTEGER, &n.to_string()),
            Value::Null => put_line(out, tag::BULK_STRING, "-1"),
            Value::BulkString(data) => {
                put_line(out, tag::BULK_STRING, &data.len().to_string());
                out.extend_from_slice(data);
                out.extend_from_slice(CRLF);
            }
            Value::Array(items) => {
                put_line(out, tag::ARRAY, &items.len().to_string());
                for item in items {
                    item.serialize_into(out);
                }
            }
            Value::Map(pairs) => {
                put_line(out, tag::MAP, &pairs.len().to_string());
                for (key, value) in pairs {
                    key.serialize_into(out);
                    value.serialize_into(out);
                }
            }
        }
    }
}

/// Writes one `<tag><text>\r\n` header or line frame.
fn put_line(out: &mut Vec<u8>, tag: u8, text: &str) {
    out.push(tag);
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(CRLF);
}
