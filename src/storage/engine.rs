//! Thread-Safe Key-Value Store with Expiry Support
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: 64 shards, each a `RwLock<HashMap>`, so connections
//!    touching different keys rarely contend.
//! 2. **Lazy Expiry**: an entry whose deadline has passed is logically dead.
//!    It is removed by the first operation that looks at it, or by
//!    [`KeyValueStore::purge_expired_now`].
//! 3. **Injected Clock**: deadlines are absolute epoch milliseconds read from a
//!    [`Clock`], never from the system clock directly.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KeyValueStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation holds its key's shard lock for the whole check-and-mutate
//! step, so all operations are linearizable per key. Multi-key operations
//! (`del`, `exists`) are atomic per key, not across the set.

use crate::storage::clock::{Clock, SystemClock};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Number of shards for the store.
const NUM_SHARDS: usize = 64;

/// A stored value with an optional absolute deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: String,
    /// Epoch milliseconds after which the entry is dead (None = never expires)
    pub expire_at_ms: Option<i64>,
}

impl Entry {
    /// An entry is dead once `expire_at_ms <= now`.
    #[inline]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expire_at_ms.is_some_and(|at| at <= now_ms)
    }
}

#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<String, Entry>>,
}

impl Shard {
    // A writer never releases the lock with a half-built entry, so a poisoned
    // map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The shared key-value store.
///
/// Wrap it in an `Arc` and hand a clone to every connection.
///
/// # Example
///
/// ```
/// use respkv::storage::KeyValueStore;
/// use std::time::Duration;
///
/// let store = KeyValueStore::new();
/// store.set("name", "Ariz", None);
/// assert_eq!(store.get("name"), Some("Ariz".to_string()));
///
/// store.set("session", "abc123", Some(Duration::from_secs(60)));
/// assert_eq!(store.ttl("session"), 60);
/// assert_eq!(store.ttl("missing"), -2);
/// ```
pub struct KeyValueStore {
    shards: Vec<Shard>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("shards", &self.shards.len())
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for KeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore {
    /// Creates a store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();
        Self { shards, clock }
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    #[inline]
    fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Returns the value for `key`, or `None` if absent or expired.
    ///
    /// An expired entry is removed before returning.
    pub fn get(&self, key: &str) -> Option<String> {
        self.read_live(key, |entry| entry.value.clone())
    }

    /// Applies `f` to the live entry for `key`, removing it instead if it has
    /// expired.
    fn read_live<T>(&self, key: &str, f: impl Fn(&Entry) -> T) -> Option<T> {
        let shard = self.shard(key);
        let now = self.now_ms();

        // Read lock first: the common case is a live hit or a plain miss.
        {
            let data = shard.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(f(entry)),
                Some(_) => {}
                None => return None,
            }
        }

        // Re-check under the write lock: another connection may have replaced
        // the entry between the two lock acquisitions.
        let mut data = shard.write();
        match data.get(key) {
            Some(entry) if entry.is_expired(now) => {
                data.remove(key);
                None
            }
            Some(entry) => Some(f(entry)),
            None => None,
        }
    }

    /// Inserts or replaces `key`.
    ///
    /// With `ttl` the entry dies at `now + ttl`; without it any previous
    /// expiry is dropped.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        let key = key.into();
        let expire_at_ms = ttl.map(|ttl| {
            let ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            self.now_ms().saturating_add(ms)
        });
        let entry = Entry {
            value: value.into(),
            expire_at_ms,
        };
        self.shard(&key).write().insert(key, entry);
    }

    /// Removes each present key and returns how many were removed.
    pub fn del<K: AsRef<str>>(&self, keys: &[K]) -> i64 {
        keys.iter()
            .filter(|key| {
                let key: &str = key.as_ref();
                self.shard(key).write().remove(key).is_some()
            })
            .count() as i64
    }

    /// Counts the keys that are present and live.
    pub fn exists<K: AsRef<str>>(&self, keys: &[K]) -> i64 {
        keys.iter()
            .filter(|key| self.read_live(key.as_ref(), |_| ()).is_some())
            .count() as i64
    }

    /// Sets `key` to expire `seconds` from now.
    ///
    /// Returns 1 if the deadline was set, 0 if the key is absent or already
    /// expired (an expired entry is removed).
    pub fn expire(&self, key: &str, seconds: i64) -> i64 {
        let now = self.now_ms();
        let mut data = self.shard(key).write();

        match data.get_mut(key) {
            None => 0,
            Some(entry) if entry.is_expired(now) => {
                data.remove(key);
                0
            }
            Some(entry) => {
                entry.expire_at_ms = Some(now.saturating_add(seconds.saturating_mul(1000)));
                1
            }
        }
    }

    /// Clears the deadline of `key`.
    ///
    /// Returns 1 if a deadline was removed, 0 if the key is absent, expired,
    /// or never had one.
    pub fn persist(&self, key: &str) -> i64 {
        let now = self.now_ms();
        let mut data = self.shard(key).write();

        match data.get_mut(key) {
            None => 0,
            Some(entry) if entry.is_expired(now) => {
                data.remove(key);
                0
            }
            Some(entry) => match entry.expire_at_ms.take() {
                Some(_) => 1,
                None => 0,
            },
        }
    }

    /// Remaining time to live of `key` in whole seconds, rounded up.
    ///
    /// - `-2` if the key is absent or expired (an expired entry is removed)
    /// - `-1` if the key has no deadline
    /// - otherwise `ceil(ms_left / 1000)`, which is at least 1
    pub fn ttl(&self, key: &str) -> i64 {
        let shard = self.shard(key);
        let now = self.now_ms();

        {
            let data = shard.read();
            match data.get(key) {
                None => return -2,
                Some(entry) => match entry.expire_at_ms {
                    None => return -1,
                    Some(at) if at > now => return ceil_seconds(at - now),
                    Some(_) => {}
                },
            }
        }

        let mut data = shard.write();
        match data.get(key).map(|entry| entry.expire_at_ms) {
            None => -2,
            Some(None) => -1,
            Some(Some(at)) if at > now => ceil_seconds(at - now),
            Some(Some(_)) => {
                data.remove(key);
                -2
            }
        }
    }

    /// Removes every entry whose deadline has passed.
    ///
    /// Not scheduled by the store itself; see
    /// [`ExpirySweeper`](crate::storage::ExpirySweeper). Returns the number of
    /// entries removed.
    pub fn purge_expired_now(&self) -> u64 {
        let now = self.now_ms();
        let mut removed = 0u64;

        for shard in &self.shards {
            let mut data = shard.write();
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired(now));
            removed += (before - data.len()) as u64;
        }

        removed
    }

    /// Number of physically stored entries, including expired ones not yet
    /// removed.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

#[inline]
fn ceil_seconds(ms_left: i64) -> i64 {
    ms_left / 1000 + i64::from(ms_left % 1000 != 0)
}
