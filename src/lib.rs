//! # respkv - An In-Memory Key-Value Server Speaking RESP
//!
//! respkv is a single-node, in-memory key-value server that talks the
//! Redis Serialization Protocol (RESP) over TCP. It serves a small, fixed
//! command set against a store with per-key expiry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               respkv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │ COMMANDS table          │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   RESP      │    │              KeyValueStore                   │   │
//! │  │ reader and  │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │  encoder    │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...64   │ │   │
//! │  └─────────────┘    │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use respkv::server::{Server, ServerOptions};
//! use respkv::storage::{ExpiryConfig, ExpirySweeper};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind("127.0.0.1:6379", ServerOptions::default()).await?;
//!     let _sweeper = ExpirySweeper::start(Arc::clone(server.store()), ExpiryConfig::default());
//!
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]`
//! - `ECHO message`
//! - `GET key`
//! - `SET key value`
//! - `DEL key`
//! - `EXISTS key`
//! - `EXPIRE key seconds`
//! - `TTL key`
//! - `PERSIST key`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP values, the incremental parser and the stream reader
//! - [`storage`]: sharded store with lazy expiry, clocks and the sweeper
//! - [`commands`]: the command table and dispatcher
//! - [`connection`]: the per-client read-dispatch-reply loop
//! - [`server`]: the accept loop
//! - [`config`]: flags and environment variables for the binary
//!
//! ## Expiry
//!
//! Keys with a deadline are expired in two ways:
//! 1. **Lazy**: an access that finds a passed deadline removes the entry
//! 2. **Active**: the sweeper periodically purges everything that has expired
//!
//! No command ever observes an expired value, whether or not the sweeper ran.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use server::{Server, ServerOptions};
pub use storage::{ExpiryConfig, ExpirySweeper, KeyValueStore};

/// The default port respkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host respkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
