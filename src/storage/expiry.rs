//! Background Expiry Sweeper
//!
//! Lazy expiry only reclaims an entry when someone touches its key again.
//! Keys that are written once and never read would stay in memory forever,
//! so the server also runs this task, which calls
//! [`KeyValueStore::purge_expired_now`] on a fixed interval.
//!
//! The store does not schedule itself; the sweeper is an ordinary caller.

use crate::storage::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Time between two sweeps (default: 100ms)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current tokio runtime.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use respkv::storage::{ExpiryConfig, ExpirySweeper, KeyValueStore};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main] async fn main() {
    /// let store = Arc::new(KeyValueStore::new());
    /// let sweeper = ExpirySweeper::start(store, ExpiryConfig::default());
    ///
    /// // Dropping the handle stops the task.
    /// drop(sweeper);
    /// # }
    /// ```
    pub fn start(store: Arc<KeyValueStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, config.clone(), shutdown_rx));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Background expiry sweeper started"
        );

        Self { shutdown_tx }
    }

    /// Stops the sweeper. Called automatically on drop.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    store: Arc<KeyValueStore>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let removed = store.purge_expired_now();
        if removed > 0 {
            debug!(
                removed,
                keys_remaining = store.len(),
                "Expired keys cleaned up"
            );
        } else {
            trace!("Expiry sweep found nothing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ManualClock;

    #[tokio::test]
    async fn test_sweeper_purges_expired_keys() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(KeyValueStore::with_clock(clock.clone()));

        for i in 0..10 {
            store.set(format!("key{}", i), "value", Some(Duration::from_millis(50)));
        }
        store.set("persistent", "value", None);
        assert_eq!(store.len(), 11);

        let _sweeper = ExpirySweeper::start(
            Arc::clone(&store),
            ExpiryConfig {
                interval: Duration::from_millis(10),
            },
        );

        clock.advance(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.exists(&["persistent"]), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(KeyValueStore::with_clock(clock.clone()));

        {
            let _sweeper = ExpirySweeper::start(
                Arc::clone(&store),
                ExpiryConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        store.set("key", "value", Some(Duration::from_millis(10)));
        clock.advance(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Nobody swept, the dead entry is still physically present.
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("key"), None);
        assert_eq!(store.len(), 0);
    }
}
