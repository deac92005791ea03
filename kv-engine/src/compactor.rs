//! # Compactor
//!
//! Purpose: A background task that periodically rewrites the WAL down to
//! the live entry set, turning an unbounded append log into one whose size
//! tracks the index rather than the history of operations. Same
//! cancellation shape as the reaper: sleep raced against a shutdown
//! signal, never torn down mid-compaction.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::Store;

/// Spawns the compactor loop.
pub fn spawn(store: Arc<Store>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = store.compact().await {
                        tracing::warn!(error = %e, "scheduled compaction failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
