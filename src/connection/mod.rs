//! Connection Module
//!
//! Manages individual client connections. Each connection runs in its own
//! task, so many clients are served concurrently against one shared store.
//!
//! ## Architecture
//!
//! ```text
//!                  Server (accept loop)
//!                        │
//!                        │ spawn task per client
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐ │
//! │  │ RespReader  │───>│command_args │───>│ CommandHandler   │ │
//! │  │ (read half) │    │             │    │   ::dispatch     │ │
//! │  └─────────────┘    └─────────────┘    └────────┬─────────┘ │
//! │                                                 ▼           │
//! │                                      ┌──────────────────┐   │
//! │                                      │ BufWriter (write │   │
//! │                                      │ half), flushed   │   │
//! │                                      └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pipelined requests are answered in order: leftover bytes stay in the
//! reader's buffer and are decoded before the next socket read.
//!
//! ## Example
//!
//! ```no_run
//! use respkv::commands::CommandHandler;
//! use respkv::connection::{handle_connection, ConnectionStats};
//! use respkv::protocol::stream::DEFAULT_MAX_FRAME_BYTES;
//! use respkv::storage::KeyValueStore;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # #[tokio::main] async fn main() -> std::io::Result<()> {
//! let store = Arc::new(KeyValueStore::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(store);
//! tokio::spawn(handle_connection(stream, addr, handler, stats, DEFAULT_MAX_FRAME_BYTES));
//! # Ok(()) }
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
