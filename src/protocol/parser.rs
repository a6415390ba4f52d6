//! Wire Protocol Decoder
//!
//! Decodes one frame from a caller-owned buffer. Because TCP delivers a
//! stream, the buffer may hold half a frame or several frames at once;
//! the decoder distinguishes three outcomes:
//!
//! - `Ok(Some((value, consumed)))` - one complete frame, `consumed`
//!   bytes of the buffer belong to it
//! - `Ok(None)` - the buffered bytes are a valid prefix of a frame;
//!   wait for more data and try again
//! - `Err(ParseError)` - the bytes cannot become a valid frame
//!
//! The caller advances its buffer by `consumed` after a success and
//! decides what to do with the connection after an error. Decoding is
//! synchronous and keeps no state between frames; concurrency is the
//! connection handler's concern.
//!
//! Internally a [`Cursor`] walks the buffer: line-oriented headers come
//! from [`Cursor::line`], fixed-size payloads from [`Cursor::chunk`],
//! and running past the end of the buffer surfaces as the incomplete
//! case rather than an error.

use crate::protocol::types::{tag, Value, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Unknown frame tag byte
    #[error("unknown frame tag: {0:#04x}")]
    UnknownTag(u8),

    /// Invalid integer format in a `:` frame or a length line
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a textual frame part
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array or map length is negative
    #[error("invalid collection length: {0}")]
    InvalidCollectionLength(i64),

    /// Structural violation (missing CRLF, excessive nesting, etc.)
    #[error("protocol error: {0}")]
    Malformed(String),

    /// The frame exceeds the maximum allowed size
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum nesting depth for arrays and maps
pub const MAX_NESTING_DEPTH: usize = 32;

/// A position in the buffer being decoded.
///
/// All reads go through the cursor so "not enough bytes yet" has one
/// representation: the read methods answer `None` (or `Ok(None)`)
/// without moving past the end.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Consumes and returns the next byte.
    fn bump(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Consumes the next `n` bytes as a slice.
    fn chunk(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        if end > self.buf.len() {
            return None;
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    /// Consumes everything up to and including the next CRLF and
    /// returns the text before it. `Ok(None)` when no CRLF has arrived
    /// yet.
    fn line(&mut self) -> ParseResult<Option<&'a str>> {
        let rest = &self.buf[self.pos..];
        let Some(end) = rest.windows(2).position(|pair| pair == CRLF) else {
            return Ok(None);
        };

        let text = std::str::from_utf8(&rest[..end])
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
        self.pos += end + 2;
        Ok(Some(text))
    }

    /// A CRLF-terminated line holding a decimal integer, as used by the
    /// `:` frame and by every length header.
    fn int_line(&mut self) -> ParseResult<Option<i64>> {
        match self.line()? {
            Some(text) => text
                .parse()
                .map(Some)
                .map_err(|e: ParseIntError| ParseError::InvalidInteger(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Frame decoder for the wire protocol.
///
/// ```ignore
/// use reddb::protocol::FrameParser;
/// use bytes::{Buf, BytesMut};
///
/// let parser = FrameParser::new();
/// let mut buffer = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n"[..]);
///
/// if let Some((value, consumed)) = parser.parse(&buffer)? {
///     buffer.advance(consumed);
///     println!("decoded {:?}", value);
/// }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameParser;

impl FrameParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        FrameParser
    }

    /// Attempts to decode one frame from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Value, usize)>> {
        let mut cursor = Cursor::new(buf);
        match self.read_value(&mut cursor, 0)? {
            Some(value) => Ok(Some((value, cursor.pos))),
            None => Ok(None),
        }
    }

    /// Decodes the frame starting at the cursor. `depth` counts how
    /// many collections enclose it.
    fn read_value(&self, cursor: &mut Cursor, depth: usize) -> ParseResult<Option<Value>> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::Malformed(format!(
                "nesting deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }

        let Some(tag_byte) = cursor.bump() else {
            return Ok(None);
        };

        match tag_byte {
            tag::SIMPLE_STRING => {
                Ok(cursor.line()?.map(|text| Value::SimpleString(text.into())))
            }
            tag::ERROR => Ok(cursor.line()?.map(|text| Value::Error(text.into()))),
            tag::INTEGER => Ok(cursor.int_line()?.map(Value::Integer)),
            tag::BULK_STRING => self.read_bulk(cursor),
            tag::ARRAY => self.read_array(cursor, depth),
            tag::MAP => self.read_map(cursor, depth),
            other => Err(ParseError::UnknownTag(other)),
        }
    }

    /// `$<len>\r\n<len bytes>\r\n`, with `$-1\r\n` standing for null.
    fn read_bulk(&self, cursor: &mut Cursor) -> ParseResult<Option<Value>> {
        let Some(declared) = cursor.int_line()? else {
            return Ok(None);
        };

        if declared == -1 {
            return Ok(Some(Value::Null));
        }
        if declared < 0 {
            return Err(ParseError::InvalidBulkLength(declared));
        }

        let len = declared as usize;
        if len > MAX_BULK_SIZE {
            return Err(ParseError::FrameTooLarge {
                size: len,
                max: MAX_BULK_SIZE,
            });
        }

        let Some(payload) = cursor.chunk(len) else {
            return Ok(None);
        };
        let Some(terminator) = cursor.chunk(2) else {
            return Ok(None);
        };
        if terminator != CRLF {
            return Err(ParseError::Malformed(
                "bulk payload not CRLF-terminated".into(),
            ));
        }

        Ok(Some(Value::BulkString(Bytes::copy_from_slice(payload))))
    }

    /// `*<n>\r\n` plus n nested frames, with `*-1\r\n` standing for
    /// null.
    fn read_array(&self, cursor: &mut Cursor, depth: usize) -> ParseResult<Option<Value>> {
        let Some(count) = cursor.int_line()? else {
            return Ok(None);
        };

        if count == -1 {
            return Ok(Some(Value::Null));
        }
        if count < 0 {
            return Err(ParseError::InvalidCollectionLength(count));
        }

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.read_value(cursor, depth + 1)? {
                Some(item) => items.push(item),
                None => return Ok(None),
            }
        }

        Ok(Some(Value::Array(items)))
    }

    /// `%<n>\r\n` plus n key/value frame pairs.
    fn read_map(&self, cursor: &mut Cursor, depth: usize) -> ParseResult<Option<Value>> {
        let Some(count) = cursor.int_line()? else {
            return Ok(None);
        };

        if count < 0 {
            return Err(ParseError::InvalidCollectionLength(count));
        }

        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let Some(key) = self.read_value(cursor, depth + 1)? else {
                return Ok(None);
            };
            let Some(value) = self.read_value(cursor, depth + 1)? else {
                return Ok(None);
            };
            pairs.push((key, value));
        }

        Ok(Some(Value::Map(pairs)))
    }
}

/// Decodes a single frame from `buf` with a throwaway parser.
pub fn parse_frame(buf: &[u8]) -> ParseResult<Option<(Value, usize)>> {
    FrameParser::new().parse(buf)
}
