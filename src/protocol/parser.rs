//! Incremental RESP Parser
//!
//! The parser works over a byte buffer that may hold a partial message,
//! exactly one message, or several pipelined messages. It returns either:
//!
//! - `Ok(Some((value, consumed)))` - a complete value, `consumed` bytes were used
//! - `Ok(None)` - the message is incomplete, read more bytes and retry
//! - `Err(ParseError)` - the bytes violate the protocol
//!
//! The caller owns the buffer: append incoming network data, call
//! [`RespParser::parse`], and on success advance the buffer by `consumed`.
//! A protocol error is fatal to the connection because the framing can no
//! longer be trusted.

use crate::protocol::types::{prefix, RespValue, CRLF, MAX_NESTING_DEPTH};
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Leading byte is not one of `+ - : $ *`
    #[error("unknown RESP type marker: {0:#04x}")]
    UnknownPrefix(u8),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Text payload is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array count is negative; null arrays are not supported
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// A bulk string payload is not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    #[error("array nesting exceeds maximum depth of {0}")]
    NestingTooDeep(usize),

    /// The message exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// A RESP protocol parser.
///
/// # Example
///
/// ```
/// use respkv::protocol::{RespParser, RespValue};
///
/// let parser = RespParser::new();
/// let buf = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
///
/// let (value, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(consumed, buf.len());
/// assert_eq!(
///     value,
///     RespValue::array(vec![RespValue::bulk_string("GET"), RespValue::bulk_string("name")])
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RespParser {
    max_depth: usize,
    max_bulk_len: usize,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RespParser {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
            max_bulk_len: MAX_BULK_SIZE,
        }
    }

    /// Caps the length a single bulk string may declare.
    pub fn with_max_bulk_len(mut self, max_bulk_len: usize) -> Self {
        self.max_bulk_len = max_bulk_len;
        self
    }

    /// Attempts to parse one RESP value from the start of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.parse_value(buf, 0)
    }

    fn parse_value(&self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        let Some(&marker) = buf.first() else {
            return Ok(None);
        };

        match marker {
            prefix::SIMPLE_STRING => {
                Ok(read_line(buf)?.map(|(s, n)| (RespValue::SimpleString(s.to_string()), n)))
            }
            prefix::ERROR => Ok(read_line(buf)?.map(|(s, n)| (RespValue::Error(s.to_string()), n))),
            prefix::INTEGER => match read_line(buf)? {
                Some((s, n)) => Ok(Some((RespValue::Integer(parse_i64(s)?), n))),
                None => Ok(None),
            },
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf, depth),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (length, header_len) = match read_line(buf)? {
            Some((s, n)) => (parse_i64(s)?, n),
            None => return Ok(None),
        };

        if length == -1 {
            return Ok(Some((RespValue::BulkString(None), header_len)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > self.max_bulk_len {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: self.max_bulk_len,
            });
        }

        let total_needed = header_len + length + CRLF.len();
        if buf.len() < total_needed {
            return Ok(None);
        }

        let data = &buf[header_len..header_len + length];
        if &buf[header_len + length..total_needed] != CRLF {
            return Err(ParseError::MissingCrlf);
        }

        let text = std::str::from_utf8(data).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
        Ok(Some((RespValue::BulkString(Some(text.to_string())), total_needed)))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        if depth >= self.max_depth {
            return Err(ParseError::NestingTooDeep(self.max_depth));
        }

        let (count, mut consumed) = match read_line(buf)? {
            Some((s, n)) => (parse_i64(s)?, n),
            None => return Ok(None),
        };
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        // Don't trust the declared count for preallocation.
        let mut elements = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            match self.parse_value(&buf[consumed..], depth + 1)? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

/// Finds where the next complete message ends without building it.
///
/// The scanner remembers how far it got, so when the caller appends bytes to
/// the same buffer and scans again, elements that were already complete are
/// not looked at twice. Nothing is allocated per element.
///
/// Size is checked in byte order as the scan advances: a message is rejected
/// with [`ParseError::MessageTooLarge`] as soon as it is known to be longer
/// than `max_frame_bytes`, however the bytes were split across reads.
///
/// After `scan` returns a length the scanner is reset and expects the caller
/// to drop that many bytes from the front of the buffer.
#[derive(Debug, Clone)]
pub struct FrameScanner {
    max_depth: usize,
    max_frame_bytes: usize,
    /// Offset of the element being scanned
    pos: usize,
    /// Bytes past `pos` already searched for CRLF
    searched: usize,
    /// Elements still owed by each open array, innermost last
    open: Vec<u64>,
}

impl FrameScanner {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
            max_frame_bytes,
            pos: 0,
            searched: 0,
            open: Vec::new(),
        }
    }

    /// Forgets any partial progress.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.searched = 0;
        self.open.clear();
    }

    /// Returns the length of the complete message at the start of `buf`, or
    /// `Ok(None)` if more bytes are needed.
    ///
    /// `buf` must extend the buffer passed to the previous call.
    pub fn scan(&mut self, buf: &[u8]) -> ParseResult<Option<usize>> {
        loop {
            let rest = &buf[self.pos..];
            let Some(&marker) = rest.first() else {
                return Ok(None);
            };

            // Resume one byte early in case the CR arrived at the end of the
            // previous read.
            let from = self.searched.saturating_sub(1).max(1);
            let line_end = match find_crlf(&rest[from..]) {
                Some(at) => from + at,
                None => {
                    self.searched = rest.len();
                    self.check_size(buf.len())?;
                    return Ok(None);
                }
            };
            self.searched = 0;

            let header_len = line_end + CRLF.len();
            let line = &rest[1..line_end];

            let element_len = match marker {
                prefix::SIMPLE_STRING | prefix::ERROR => header_len,
                prefix::INTEGER => {
                    parse_i64(line_str(line)?)?;
                    header_len
                }
                prefix::BULK_STRING => match parse_i64(line_str(line)?)? {
                    -1 => header_len,
                    n if n < 0 => return Err(ParseError::InvalidBulkLength(n)),
                    n => header_len
                        .saturating_add(usize::try_from(n).unwrap_or(usize::MAX))
                        .saturating_add(CRLF.len()),
                },
                prefix::ARRAY => {
                    if self.open.len() >= self.max_depth {
                        return Err(ParseError::NestingTooDeep(self.max_depth));
                    }
                    let count = parse_i64(line_str(line)?)?;
                    if count < 0 {
                        return Err(ParseError::InvalidArrayLength(count));
                    }

                    self.pos += header_len;
                    self.check_size(self.pos)?;
                    if count > 0 {
                        self.open.push(count as u64);
                    } else if let Some(len) = self.complete_element() {
                        return Ok(Some(len));
                    }
                    continue;
                }
                other => return Err(ParseError::UnknownPrefix(other)),
            };

            let element_end = self.pos.saturating_add(element_len);
            self.check_size(element_end)?;
            if buf.len() < element_end {
                return Ok(None);
            }

            self.pos = element_end;
            if let Some(len) = self.complete_element() {
                return Ok(Some(len));
            }
        }
    }

    /// Marks the element ending at `pos` as done. Returns the message length
    /// when that closes the outermost value.
    fn complete_element(&mut self) -> Option<usize> {
        while let Some(remaining) = self.open.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                return None;
            }
            self.open.pop();
        }

        let len = self.pos;
        self.reset();
        Some(len)
    }

    fn check_size(&self, size: usize) -> ParseResult<()> {
        if size > self.max_frame_bytes {
            return Err(ParseError::MessageTooLarge {
                size,
                max: self.max_frame_bytes,
            });
        }
        Ok(())
    }
}

fn line_str(line: &[u8]) -> ParseResult<&str> {
    std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

/// Reads the line after the type marker.
///
/// Returns the line text and the bytes consumed including marker and CRLF.
fn read_line(buf: &[u8]) -> ParseResult<Option<(&str, usize)>> {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let line = std::str::from_utf8(&buf[1..1 + pos])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
            Ok(Some((line, 1 + pos + CRLF.len())))
        }
        None => Ok(None),
    }
}

fn parse_i64(s: &str) -> ParseResult<i64> {
    s.parse()
        .map_err(|_| ParseError::InvalidInteger(s.to_string()))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Parses a single RESP message from bytes with default limits.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}
