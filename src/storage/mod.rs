//! Storage Module
//!
//! A thread-safe, sharded key-value store with per-key expiry, the clock it
//! reads time from, and a background sweeper that reclaims expired entries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KeyValueStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │  ◄── Clock │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ purge_expired_now()
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use respkv::storage::{KeyValueStore, ManualClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(ManualClock::new(0));
//! let store = KeyValueStore::with_clock(clock.clone());
//!
//! store.set("session", "token123", Some(Duration::from_millis(50)));
//! assert!(store.get("session").is_some());
//!
//! clock.advance(Duration::from_millis(80));
//! assert!(store.get("session").is_none());
//! ```

pub mod clock;
pub mod engine;
pub mod expiry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Entry, KeyValueStore};
pub use expiry::{ExpiryConfig, ExpirySweeper};
