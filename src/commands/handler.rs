//! Command Handler
//!
//! Turns a parsed command (operation name followed by text arguments) into a
//! store operation and a RESP reply.
//!
//! ## Supported Commands
//!
//! - `PING [message]` - Test connection
//! - `ECHO message` - Echo message
//! - `GET key` - Get a key's value
//! - `SET key value` - Set a key (drops any expiry)
//! - `DEL key` - Delete a key
//! - `EXPIRE key seconds` - Set expiry
//! - `EXISTS key` - Check if a key exists
//! - `TTL key` - Get remaining TTL in seconds
//! - `PERSIST key` - Remove expiry
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  lookup()   │───>│ arity check │───>│  cmd_*()    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                        KeyValueStore        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! User errors (bad arity, unknown command, non-numeric argument) become
//! `-ERR ...` replies and leave the connection usable. An arity error never
//! touches the store.

use crate::commands::table::lookup;
use crate::protocol::{write_value, EncodeError, RespValue};
use crate::storage::KeyValueStore;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Command-level failures, reported to the client as error replies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR empty command")]
    Empty,

    #[error("ERR unknown command '{0}'")]
    Unknown(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    /// A command array element that is neither text nor an integer
    #[error("ERR invalid command format")]
    InvalidFormat,
}

impl CommandError {
    pub fn to_reply(&self) -> RespValue {
        RespValue::error(self.to_string())
    }
}

/// Extracts command arguments from a decoded top-level message.
///
/// Returns `Ok(None)` for anything that is not a non-empty array; such
/// messages get no reply. Integer elements are accepted and rendered in
/// decimal.
pub fn command_args(frame: RespValue) -> Result<Option<Vec<String>>, CommandError> {
    let elements = match frame {
        RespValue::Array(elements) if !elements.is_empty() => elements,
        _ => return Ok(None),
    };

    elements
        .into_iter()
        .map(|element| match element {
            RespValue::BulkString(Some(s)) | RespValue::SimpleString(s) => Ok(s),
            RespValue::Integer(n) => Ok(n.to_string()),
            _ => Err(CommandError::InvalidFormat),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Executes commands against a shared store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<KeyValueStore>,
}

impl CommandHandler {
    pub fn new(store: Arc<KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<KeyValueStore> {
        &self.store
    }

    /// Executes a command and returns the reply.
    ///
    /// `args[0]` is the operation name, matched case-insensitively.
    pub fn execute(&self, args: &[String]) -> RespValue {
        self.try_execute(args)
            .unwrap_or_else(|err| err.to_reply())
    }

    /// Executes a command and writes the reply to `out`, flushing it.
    ///
    /// Returns the number of bytes written. An error here means the stream is
    /// unusable.
    pub async fn dispatch<W>(&self, out: &mut W, args: &[String]) -> Result<usize, EncodeError>
    where
        W: AsyncWrite + Unpin,
    {
        let reply = self.execute(args);
        let written = write_value(out, &reply).await?;
        out.flush().await?;
        Ok(written)
    }

    fn try_execute(&self, args: &[String]) -> Result<RespValue, CommandError> {
        let (name, rest) = args.split_first().ok_or(CommandError::Empty)?;

        let spec = lookup(name).ok_or_else(|| {
            // Echoed inside a single-line error reply.
            CommandError::Unknown(name.to_uppercase().replace(['\r', '\n'], " "))
        })?;

        if !spec.arity.accepts(rest.len()) {
            return Err(CommandError::WrongArity(spec.name));
        }

        (spec.handler)(self, rest)
    }

    // ========================================================================
    // Command implementations. Arity is checked before these run.
    // ========================================================================

    /// PING [message]
    pub(crate) fn cmd_ping(&self, args: &[String]) -> Result<RespValue, CommandError> {
        Ok(match args.first() {
            None => RespValue::pong(),
            // A simple string cannot carry a line break.
            Some(msg) if msg.contains(['\r', '\n']) => RespValue::bulk_string(msg.as_str()),
            Some(msg) => RespValue::simple_string(msg.as_str()),
        })
    }

    /// ECHO message
    pub(crate) fn cmd_echo(&self, args: &[String]) -> Result<RespValue, CommandError> {
        Ok(RespValue::bulk_string(args[0].as_str()))
    }

    /// GET key
    pub(crate) fn cmd_get(&self, args: &[String]) -> Result<RespValue, CommandError> {
        Ok(self.store.get(&args[0]).into())
    }

    /// SET key value
    pub(crate) fn cmd_set(&self, args: &[String]) -> Result<RespValue, CommandError> {
        self.store.set(args[0].as_str(), args[1].as_str(), None);
        Ok(RespValue::ok())
    }

    /// DEL key
    pub(crate) fn cmd_del(&self, args: &[String]) -> Result<RespValue, CommandError> {
        Ok(RespValue::integer(self.store.del(&args[..1])))
    }

    /// EXPIRE key seconds
    pub(crate) fn cmd_expire(&self, args: &[String]) -> Result<RespValue, CommandError> {
        let seconds: i64 = args[1].parse().map_err(|_| CommandError::NotAnInteger)?;
        Ok(RespValue::integer(self.store.expire(&args[0], seconds)))
    }

    /// EXISTS key
    pub(crate) fn cmd_exists(&self, args: &[String]) -> Result<RespValue, CommandError> {
        Ok(RespValue::integer(self.store.exists(&args[..1])))
    }

    /// TTL key
    pub(crate) fn cmd_ttl(&self, args: &[String]) -> Result<RespValue, CommandError> {
        Ok(RespValue::integer(self.store.ttl(&args[0])))
    }

    /// PERSIST key
    pub(crate) fn cmd_persist(&self, args: &[String]) -> Result<RespValue, CommandError> {
        Ok(RespValue::integer(self.store.persist(&args[0])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ManualClock;
    use std::time::Duration;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(KeyValueStore::new()))
    }

    fn create_handler_with_clock() -> (CommandHandler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = Arc::new(KeyValueStore::with_clock(clock.clone()));
        (CommandHandler::new(store), clock)
    }

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_command() {
        let handler = create_handler();
        assert_eq!(handler.execute(&[]), RespValue::error("ERR empty command"));
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();
        assert_eq!(handler.execute(&cmd(&["PING"])), RespValue::pong());
        assert_eq!(
            handler.execute(&cmd(&["ping", "hello"])),
            RespValue::simple_string("hello")
        );
        assert_eq!(
            handler.execute(&cmd(&["PING", "a", "b"])),
            RespValue::error("ERR wrong number of arguments for 'PING' command")
        );
    }

    #[test]
    fn test_ping_with_line_break_replies_bulk() {
        let handler = create_handler();
        assert_eq!(
            handler.execute(&cmd(&["PING", "a\r\nb"])),
            RespValue::bulk_string("a\r\nb")
        );
    }

    #[test]
    fn test_echo() {
        let handler = create_handler();
        assert_eq!(
            handler.execute(&cmd(&["ECHO", "value"])),
            RespValue::bulk_string("value")
        );
    }

    #[test]
    fn test_set_get_del_scenario() {
        let handler = create_handler();
        assert_eq!(handler.execute(&cmd(&["SET", "foo", "bar"])), RespValue::ok());
        assert_eq!(
            handler.execute(&cmd(&["GET", "foo"])),
            RespValue::bulk_string("bar")
        );
        assert_eq!(handler.execute(&cmd(&["DEL", "foo"])), RespValue::integer(1));
        assert_eq!(handler.execute(&cmd(&["GET", "foo"])), RespValue::null());
        assert_eq!(handler.execute(&cmd(&["DEL", "foo"])), RespValue::integer(0));
    }

    #[test]
    fn test_operation_name_is_case_insensitive() {
        let handler = create_handler();
        assert_eq!(handler.execute(&cmd(&["sEt", "k", "v"])), RespValue::ok());
        assert_eq!(handler.execute(&cmd(&["get", "k"])), RespValue::bulk_string("v"));
    }

    #[test]
    fn test_exists() {
        let handler = create_handler();
        handler.execute(&cmd(&["SET", "key1", "value1"]));
        assert_eq!(handler.execute(&cmd(&["EXISTS", "key1"])), RespValue::integer(1));
        assert_eq!(
            handler.execute(&cmd(&["EXISTS", "nonexistent"])),
            RespValue::integer(0)
        );
    }

    #[test]
    fn test_expire_and_ttl_on_missing_key() {
        let handler = create_handler();
        assert_eq!(
            handler.execute(&cmd(&["EXPIRE", "missing", "60"])),
            RespValue::integer(0)
        );
        assert_eq!(handler.execute(&cmd(&["TTL", "missing"])), RespValue::integer(-2));
    }

    #[test]
    fn test_expire_ttl_persist() {
        let (handler, clock) = create_handler_with_clock();
        handler.execute(&cmd(&["SET", "k", "v"]));
        assert_eq!(handler.execute(&cmd(&["TTL", "k"])), RespValue::integer(-1));
        assert_eq!(handler.execute(&cmd(&["PERSIST", "k"])), RespValue::integer(0));

        assert_eq!(handler.execute(&cmd(&["EXPIRE", "k", "10"])), RespValue::integer(1));
        assert_eq!(handler.execute(&cmd(&["TTL", "k"])), RespValue::integer(10));

        clock.advance(Duration::from_millis(4500));
        assert_eq!(handler.execute(&cmd(&["TTL", "k"])), RespValue::integer(6));

        assert_eq!(handler.execute(&cmd(&["PERSIST", "k"])), RespValue::integer(1));
        clock.advance(Duration::from_secs(30));
        assert_eq!(handler.execute(&cmd(&["TTL", "k"])), RespValue::integer(-1));
        assert_eq!(handler.execute(&cmd(&["GET", "k"])), RespValue::bulk_string("v"));
    }

    #[test]
    fn test_expired_key_disappears() {
        let (handler, clock) = create_handler_with_clock();
        handler.execute(&cmd(&["SET", "k", "v"]));
        handler.execute(&cmd(&["EXPIRE", "k", "1"]));

        clock.advance(Duration::from_secs(1));
        assert_eq!(handler.execute(&cmd(&["GET", "k"])), RespValue::null());
        assert_eq!(handler.execute(&cmd(&["EXISTS", "k"])), RespValue::integer(0));
        assert_eq!(handler.execute(&cmd(&["TTL", "k"])), RespValue::integer(-2));
    }

    #[test]
    fn test_expire_with_non_numeric_seconds() {
        let handler = create_handler();
        handler.execute(&cmd(&["SET", "k", "v"]));
        assert_eq!(
            handler.execute(&cmd(&["EXPIRE", "k", "soon"])),
            RespValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(handler.execute(&cmd(&["TTL", "k"])), RespValue::integer(-1));
    }

    #[test]
    fn test_wrong_arity_for_every_command() {
        let cases: &[&[&str]] = &[
            &["PING", "a", "b"],
            &["ECHO"],
            &["ECHO", "one", "two"],
            &["GET"],
            &["GET", "k", "extra"],
            &["SET", "k"],
            &["SET", "k", "v", "extra"],
            &["DEL"],
            &["DEL", "k", "k2"],
            &["EXPIRE", "k"],
            &["EXPIRE", "k", "1", "2"],
            &["EXISTS"],
            &["EXISTS", "k", "k2"],
            &["TTL"],
            &["TTL", "k", "k2"],
            &["PERSIST"],
            &["PERSIST", "k", "k2"],
        ];

        for case in cases {
            let (handler, _clock) = create_handler_with_clock();
            handler.execute(&cmd(&["SET", "k", "v"]));
            handler.execute(&cmd(&["EXPIRE", "k", "100"]));

            let name = case[0].to_string();
            assert_eq!(
                handler.execute(&cmd(case)),
                RespValue::error(format!(
                    "ERR wrong number of arguments for '{}' command",
                    name
                )),
                "case {:?}",
                case
            );

            // No mutation happened.
            assert_eq!(handler.store().get("k"), Some("v".to_string()), "case {:?}", case);
            assert_eq!(handler.store().ttl("k"), 100, "case {:?}", case);
            assert_eq!(handler.store().len(), 1, "case {:?}", case);
        }
    }

    #[test]
    fn test_set_with_missing_value_leaves_key_absent() {
        let handler = create_handler();
        handler.execute(&cmd(&["SET", "key"]));
        assert_eq!(handler.execute(&cmd(&["EXISTS", "key"])), RespValue::integer(0));
    }

    #[test]
    fn test_arity_error_uses_upper_case_name() {
        let handler = create_handler();
        assert_eq!(
            handler.execute(&cmd(&["get"])),
            RespValue::error("ERR wrong number of arguments for 'GET' command")
        );
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();
        assert_eq!(
            handler.execute(&cmd(&["flushall"])),
            RespValue::error("ERR unknown command 'FLUSHALL'")
        );
    }

    #[test]
    fn test_unknown_command_name_with_line_break_stays_encodable() {
        let handler = create_handler();
        let reply = handler.execute(&cmd(&["bad\r\nname"]));
        assert!(reply.is_error());
        assert!(reply.serialize().is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_writes_wire_bytes() {
        let handler = create_handler();
        let mut out: Vec<u8> = Vec::new();

        handler.dispatch(&mut out, &cmd(&["SET", "foo", "bar"])).await.unwrap();
        handler.dispatch(&mut out, &cmd(&["GET", "foo"])).await.unwrap();
        handler.dispatch(&mut out, &cmd(&["DEL", "foo"])).await.unwrap();
        handler.dispatch(&mut out, &cmd(&["GET", "foo"])).await.unwrap();
        handler.dispatch(&mut out, &cmd(&["EXPIRE", "missing", "60"])).await.unwrap();
        handler.dispatch(&mut out, &cmd(&["TTL", "missing"])).await.unwrap();
        handler.dispatch(&mut out, &[]).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "+OK\r\n$3\r\nbar\r\n:1\r\n$-1\r\n:0\r\n:-2\r\n-ERR empty command\r\n"
        );
    }

    #[tokio::test]
    async fn test_dispatch_reports_bytes_written() {
        let handler = create_handler();
        let mut out: Vec<u8> = Vec::new();
        let written = handler.dispatch(&mut out, &cmd(&["ECHO", "value"])).await.unwrap();
        assert_eq!(written, b"$5\r\nvalue\r\n".len());
        assert_eq!(out, b"$5\r\nvalue\r\n");
    }

    #[test]
    fn test_command_args_from_frame() {
        let frame = RespValue::array(vec![
            RespValue::bulk_string("EXPIRE"),
            RespValue::simple_string("k"),
            RespValue::integer(60),
        ]);
        assert_eq!(
            command_args(frame),
            Ok(Some(cmd(&["EXPIRE", "k", "60"])))
        );
    }

    #[test]
    fn test_command_args_ignores_non_commands() {
        assert_eq!(command_args(RespValue::array(vec![])), Ok(None));
        assert_eq!(command_args(RespValue::simple_string("PING")), Ok(None));
        assert_eq!(command_args(RespValue::integer(3)), Ok(None));
    }

    #[test]
    fn test_command_args_rejects_nested_values() {
        let frame = RespValue::array(vec![
            RespValue::bulk_string("GET"),
            RespValue::array(vec![]),
        ]);
        assert_eq!(command_args(frame), Err(CommandError::InvalidFormat));

        let frame = RespValue::array(vec![RespValue::bulk_string("GET"), RespValue::null()]);
        assert_eq!(command_args(frame), Err(CommandError::InvalidFormat));
    }
}
