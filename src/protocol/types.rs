//! RESP (Redis Serialization Protocol) Data Types
//!
//! This module defines the tagged value exchanged on the wire and its
//! encoding. Every value starts with a one-byte type marker:
//!
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String (`$-1` is the null bulk string)
//! - `*` Array
//!
//! Lines are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command 'FOO'\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Null Bulk String: `$-1\r\n`
//! Array: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`
//!
//! Values only hold text and signed 64-bit integers. There is no conversion
//! into [`RespValue`] from floats, booleans or `char`, so a value the wire
//! cannot represent never reaches the encoder.

use std::fmt;
use thiserror::Error;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// Maximum array nesting depth accepted by the encoder and the parser.
pub const MAX_NESTING_DEPTH: usize = 32;

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Errors raised while encoding a value for the wire.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A line-oriented payload contains CR or LF and would break framing.
    #[error("{kind} payload contains a line break")]
    LineBreak { kind: &'static str },

    /// Arrays nested deeper than the configured maximum.
    #[error("array nesting exceeds maximum depth of {max}")]
    NestingTooDeep { max: usize },

    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A value in the RESP protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Single-line text. Format: `+<string>\r\n`
    SimpleString(String),

    /// Single-line error text. Format: `-<message>\r\n`
    Error(String),

    /// Signed 64-bit integer. Format: `:<integer>\r\n`
    Integer(i64),

    /// Length-prefixed text, `None` for the null bulk string.
    /// Format: `$<length>\r\n<data>\r\n` or `$-1\r\n`
    BulkString(Option<String>),

    /// Ordered sequence of values, possibly nested.
    /// Format: `*<count>\r\n<element1><element2>...`
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Creates a new simple string value.
    ///
    /// # Example
    /// ```
    /// use respkv::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new error value.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a non-null bulk string value.
    ///
    /// # Example
    /// ```
    /// use respkv::protocol::types::RespValue;
    /// let bulk = RespValue::bulk_string("hello");
    /// assert_eq!(bulk.serialize().unwrap(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(s: impl Into<String>) -> Self {
        RespValue::BulkString(Some(s.into()))
    }

    /// The null bulk string.
    pub fn null() -> Self {
        RespValue::BulkString(None)
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(Some(_)) => "bulk string",
            RespValue::BulkString(None) => "null",
            RespValue::Array(_) => "array",
        }
    }

    /// Encodes the value into a freshly allocated buffer.
    pub fn serialize(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf)?;
        Ok(buf)
    }

    /// Encodes the value, appending to `buf`.
    ///
    /// On error `buf` may hold a partial encoding and must not be sent.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.encode_at_depth(buf, 0)
    }

    fn encode_at_depth(&self, buf: &mut Vec<u8>, depth: usize) -> Result<(), EncodeError> {
        match self {
            RespValue::SimpleString(s) => encode_line(buf, prefix::SIMPLE_STRING, s, self.kind()),
            RespValue::Error(s) => encode_line(buf, prefix::ERROR, s, self.kind()),
            RespValue::Integer(n) => {
                encode_header(buf, prefix::INTEGER, *n);
                Ok(())
            }
            RespValue::BulkString(None) => {
                encode_header(buf, prefix::BULK_STRING, -1);
                Ok(())
            }
            RespValue::BulkString(Some(s)) => {
                encode_header(buf, prefix::BULK_STRING, s.len() as i64);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
                Ok(())
            }
            RespValue::Array(values) => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(EncodeError::NestingTooDeep {
                        max: MAX_NESTING_DEPTH,
                    });
                }
                encode_header(buf, prefix::ARRAY, values.len() as i64);
                for value in values {
                    value.encode_at_depth(buf, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Returns the text of a SimpleString or non-null BulkString.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) | RespValue::BulkString(Some(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Consumes self and returns the inner array if this is an Array variant.
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }
}

fn encode_header(buf: &mut Vec<u8>, marker: u8, n: i64) {
    buf.push(marker);
    buf.extend_from_slice(n.to_string().as_bytes());
    buf.extend_from_slice(CRLF);
}

fn encode_line(
    buf: &mut Vec<u8>,
    marker: u8,
    text: &str,
    kind: &'static str,
) -> Result<(), EncodeError> {
    if text.contains(['\r', '\n']) {
        return Err(EncodeError::LineBreak { kind });
    }
    buf.push(marker);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(CRLF);
    Ok(())
}

impl From<&str> for RespValue {
    fn from(s: &str) -> Self {
        RespValue::bulk_string(s)
    }
}

impl From<String> for RespValue {
    fn from(s: String) -> Self {
        RespValue::BulkString(Some(s))
    }
}

impl From<i64> for RespValue {
    fn from(n: i64) -> Self {
        RespValue::Integer(n)
    }
}

impl<T: Into<RespValue>> From<Option<T>> for RespValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RespValue::BulkString(None))
    }
}

impl<T: Into<RespValue>> From<Vec<T>> for RespValue {
    fn from(values: Vec<T>) -> Self {
        RespValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(Some(s)) => write!(f, "\"{}\"", s),
            RespValue::BulkString(None) => write!(f, "(nil)"),
            RespValue::Array(values) => {
                if values.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}
