//! # TTL Reaper
//!
//! Purpose: A background task that periodically sweeps the index for
//! expired entries, removing them from memory and appending a matching
//! `DEL` record so a crash-and-recover cycle reaches the same state.
//! Cancellable at its sleep boundary: a shutdown signal is raced against
//! the periodic wake-up rather than torn down mid-sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::Store;

/// Spawns the reaper loop. Returns a handle the caller can `.await` during
/// shutdown to ensure the last sweep in flight finishes.
pub fn spawn(store: Arc<Store>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    store.sweep_expired().await;
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
