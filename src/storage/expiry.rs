//! Background expiry sweeper
//!
//! Lazy expiry only reclaims a key when something reads it; a key that
//! expires and is never touched again would otherwise sit in memory
//! forever. The sweeper closes that gap: a background task wakes on a
//! fixed period and runs one sampling sweep
//! ([`DataStore::remove_expired_keys`]) over the store. The sampling and
//! resampling policy lives inside the store; this module only owns the
//! task and its shutdown.

use crate::storage::DataStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Handle to the running sweeper task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper as a background task over `store`.
    pub fn start(store: Arc<DataStore>, config: SweeperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, config, shutdown_rx));
        info!("expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper task. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        debug!("expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    store: Arc<DataStore>,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }

        let removed = store.remove_expired_keys();
        if removed > 0 {
            debug!(removed, remaining = store.len(), "expired keys swept");
        }
    }
}

/// Starts the sweeper with the default one-second interval.
pub fn start_expiry_sweeper(store: Arc<DataStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, SweeperConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweeper_reclaims_untouched_expired_keys() {
        let store = Arc::new(DataStore::new());
        for i in 0..10 {
            store.set_with_expiry(format!("key{}", i), "value", 20);
        }
        store.set("persistent", "value");
        assert_eq!(store.len(), 11);

        let _sweeper = ExpirySweeper::start(
            Arc::clone(&store),
            SweeperConfig {
                interval: Duration::from_millis(10),
            },
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Nothing read those keys; only the sweeper could have removed them
        assert_eq!(store.len(), 1);
        assert!(store.contains("persistent"));
    }

    #[tokio::test]
    async fn sweeper_stops_on_drop() {
        let store = Arc::new(DataStore::new());

        {
            let _sweeper = ExpirySweeper::start(
                Arc::clone(&store),
                SweeperConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        store.set_with_expiry("key", "value", 0);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The stopped sweeper left the expired entry in place
        assert!(store.contains("key"));
        // A read still reclaims it lazily
        assert_eq!(store.get("key").unwrap(), None);
    }
}
