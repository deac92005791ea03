//! # kv-server binary
//!
//! Boots the storage engine, starts its background reaper and compactor,
//! and accepts RESP2 connections until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use kv_engine::{Store, StoreConfig};
use kv_server::server::handle_connection;

/// A single-node key-value store with bounded capacity, per-entry TTL,
/// namespacing, and WAL-backed recovery.
#[derive(Parser, Debug)]
#[command(name = "kv-server", version, about)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:6380")]
    listen_addr: String,

    /// Maximum live entry count before LRU eviction begins.
    #[arg(long, env = "STORE_CAPACITY")]
    capacity: Option<usize>,

    /// Filesystem path to the write-ahead log.
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Seconds between automatic compactions.
    #[arg(long, env = "COMPACTION_INTERVAL")]
    compaction_interval: Option<u64>,

    /// Seconds between TTL sweeps.
    #[arg(long, env = "CLEANUP_INTERVAL")]
    cleanup_interval: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<StoreConfig> {
        let mut config = StoreConfig::from_env().map_err(anyhow::Error::msg)?;
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        if let Some(secs) = self.compaction_interval {
            config.compaction_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.cleanup_interval {
            config.cleanup_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let listen_addr = cli.listen_addr.clone();
    let config = cli.into_config()?;

    tracing::info!(capacity = config.capacity, log_file = %config.log_file.display(), "starting store");
    let handle = Store::initialize(config).await.context("failed to initialize store")?;

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!(%listen_addr, "listening");

    let store = handle.store.clone();
    let accept_loop = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let store = store.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, store).await {
                            tracing::warn!(%peer, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                }
            }
        }
    });

    signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    accept_loop.abort();
    handle.shutdown().await;

    Ok(())
}
