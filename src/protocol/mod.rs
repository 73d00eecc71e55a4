//! RESP Protocol Implementation
//!
//! Codec for the Redis Serialization Protocol subset this server speaks:
//! simple strings, errors, integers, bulk strings (with null) and arrays.
//!
//! ## Modules
//!
//! - `types`: the `RespValue` tagged value and its encoding
//! - `parser`: incremental decoder over a byte buffer
//! - `stream`: decoder bound to an async reader, plus async reply writers
//!
//! ## Example
//!
//! ```
//! use respkv::protocol::{parse_message, RespValue};
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (value, consumed) = parse_message(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! let reply = RespValue::bulk_string("Ariz").serialize().unwrap();
//! assert_eq!(reply, b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod stream;
pub mod types;

pub use parser::{parse_message, FrameScanner, ParseError, ParseResult, RespParser};
pub use stream::{
    write_bulk_string, write_error, write_integer, write_simple_string, write_value, DecodeError,
    RespReader,
};
pub use types::{EncodeError, RespValue};
