//! # TCP Server
//!
//! Accept RESP2 connections, parse commands, and dispatch them to the
//! storage engine. Translation only: this module has no state of its own
//! beyond the shared `Store` handle, matching the out-of-scope "external
//! collaborator" role the transport plays here.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use kv_engine::Store;

use crate::protocol::{RespError, RespParser};

/// Handles a single TCP client connection until it disconnects or sends a
/// malformed frame.
pub async fn handle_connection(stream: TcpStream, store: Arc<Store>) -> std::io::Result<()> {
    let mut stream = stream;
    let mut buffer = BytesMut::with_capacity(8 * 1024);
    let mut parser = RespParser::new();

    loop {
        let bytes = stream.read_buf(&mut buffer).await?;
        if bytes == 0 {
            break;
        }

        loop {
            match parser.parse(&mut buffer) {
                Ok(Some(args)) => {
                    let response = dispatch_command(&args, &store).await;
                    stream.write_all(&response).await?;
                }
                Ok(None) => break,
                Err(RespError::Protocol) => {
                    stream.write_all(&resp_error("protocol error")).await?;
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

async fn dispatch_command(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    if args.is_empty() {
        return resp_error("empty command");
    }

    let cmd = &args[0];
    if eq_ignore_ascii_case(cmd, b"PING") {
        return handle_ping(args);
    }
    if eq_ignore_ascii_case(cmd, b"GET") {
        return handle_get(args, store).await;
    }
    if eq_ignore_ascii_case(cmd, b"SET") {
        return handle_set(args, store).await;
    }
    if eq_ignore_ascii_case(cmd, b"DEL") {
        return handle_del(args, store).await;
    }
    if eq_ignore_ascii_case(cmd, b"NSSIZE") {
        return handle_nssize(args, store).await;
    }
    if eq_ignore_ascii_case(cmd, b"NSLIST") {
        return handle_nslist(args, store).await;
    }
    if eq_ignore_ascii_case(cmd, b"NSCLEAR") {
        return handle_nsclear(args, store).await;
    }
    if eq_ignore_ascii_case(cmd, b"STATS") {
        return handle_stats(args, store).await;
    }
    if eq_ignore_ascii_case(cmd, b"COMPACT") {
        return handle_compact(store).await;
    }
    if eq_ignore_ascii_case(cmd, b"INFO") {
        return handle_info();
    }

    resp_error("unknown command")
}

/// Pulls a trailing `NS <namespace>` pair out of the tail of `args`, if
/// present, returning the remaining arguments and the namespace.
fn split_namespace(args: &[Vec<u8>]) -> (&[Vec<u8>], Option<String>) {
    if args.len() >= 2 && eq_ignore_ascii_case(&args[args.len() - 2], b"NS") {
        let ns = String::from_utf8_lossy(&args[args.len() - 1]).into_owned();
        (&args[..args.len() - 2], Some(ns))
    } else {
        (args, None)
    }
}

fn handle_ping(args: &[Vec<u8>]) -> Vec<u8> {
    match args.len() {
        1 => resp_simple("PONG"),
        2 => resp_bulk(&args[1]),
        _ => resp_error("wrong number of arguments for PING"),
    }
}

async fn handle_get(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    let (base, ns) = split_namespace(args);
    if base.len() != 2 {
        return resp_error("wrong number of arguments for GET");
    }
    let key = match to_text(&base[1]) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match store.get(ns.as_deref(), &key).await {
        Some(value) => resp_bulk(value.as_bytes()),
        None => resp_null(),
    }
}

async fn handle_set(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    let (base, ns) = split_namespace(args);
    if base.len() < 3 {
        return resp_error("wrong number of arguments for SET");
    }

    let key = match to_text(&base[1]) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let value = match to_text(&base[2]) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let ttl = if base.len() == 3 {
        None
    } else if base.len() == 5 && eq_ignore_ascii_case(&base[3], b"EX") {
        match parse_u64(&base[4]) {
            Ok(seconds) => Some(Duration::from_secs(seconds)),
            Err(resp) => return resp,
        }
    } else {
        return resp_error("unsupported SET options");
    };

    match store.set(ns.as_deref(), &key, value, ttl).await {
        Ok(()) => resp_simple("OK"),
        Err(e) => resp_error(&format!("store error: {e}")),
    }
}

async fn handle_del(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    let (base, ns) = split_namespace(args);
    if base.len() != 2 {
        return resp_error("wrong number of arguments for DEL");
    }
    let key = match to_text(&base[1]) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match store.delete(ns.as_deref(), &key).await {
        Ok(true) => resp_integer(1),
        Ok(false) => resp_integer(0),
        Err(e) => resp_error(&format!("store error: {e}")),
    }
}

async fn handle_nssize(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    let namespace = match args.len() {
        1 => None,
        2 => Some(String::from_utf8_lossy(&args[1]).into_owned()),
        _ => return resp_error("wrong number of arguments for NSSIZE"),
    };
    resp_integer(store.size(namespace.as_deref()).await as i64)
}

async fn handle_nslist(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    if args.len() != 1 {
        return resp_error("wrong number of arguments for NSLIST");
    }
    let namespaces = store.list_namespaces().await;
    resp_array(&namespaces)
}

async fn handle_nsclear(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    let namespace = match args.len() {
        1 => None,
        2 => Some(String::from_utf8_lossy(&args[1]).into_owned()),
        _ => return resp_error("wrong number of arguments for NSCLEAR"),
    };
    match store.clear_namespace(namespace.as_deref()).await {
        Ok(count) => resp_integer(count as i64),
        Err(e) => resp_error(&format!("store error: {e}")),
    }
}

async fn handle_stats(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    let namespace = match args.len() {
        1 => None,
        2 => Some(String::from_utf8_lossy(&args[1]).into_owned()),
        _ => return resp_error("wrong number of arguments for STATS"),
    };
    let stats = store.get_stats(namespace.as_deref()).await;

    let mut out = String::new();
    out.push_str(&format!("total_keys:{}\r\n", stats.total_keys));
    out.push_str(&format!("cache_hits:{}\r\n", stats.cache_hits));
    out.push_str(&format!("cache_misses:{}\r\n", stats.cache_misses));
    out.push_str(&format!("evictions:{}\r\n", stats.evictions));
    out.push_str(&format!("log_size:{}\r\n", stats.log_size));
    out.push_str(&format!("uptime_seconds:{}\r\n", stats.uptime.as_secs()));
    if let Some(ns_stats) = &stats.namespace_stats {
        out.push_str(&format!("namespace:{}\r\n", stats.namespace.as_deref().unwrap_or("default")));
        out.push_str(&format!("namespace_cache_hits:{}\r\n", ns_stats.cache_hits));
        out.push_str(&format!("namespace_cache_misses:{}\r\n", ns_stats.cache_misses));
        out.push_str(&format!("namespace_total_keys:{}\r\n", ns_stats.total_keys));
    }
    resp_bulk(out.as_bytes())
}

async fn handle_compact(store: &Store) -> Vec<u8> {
    match store.compact().await {
        Ok(()) => resp_simple("OK"),
        Err(e) => resp_error(&format!("store error: {e}")),
    }
}

fn handle_info() -> Vec<u8> {
    let info = b"role:master\r\nengine:kv-store\r\n";
    resp_bulk(info)
}

fn to_text(bytes: &[u8]) -> Result<String, Vec<u8>> {
    String::from_utf8(bytes.to_vec()).map_err(|_| resp_error("value is not valid utf-8 text"))
}

fn resp_simple(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 3);
    buf.extend_from_slice(b"+");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

fn resp_error(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 6);
    buf.extend_from_slice(b"-ERR ");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

fn resp_integer(value: i64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b":");
    buf.extend_from_slice(value.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

fn resp_bulk(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"$");
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

fn resp_null() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

fn resp_array(items: &[String]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
    for item in items {
        buf.extend_from_slice(&resp_bulk(item.as_bytes()));
    }
    buf
}

fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

fn parse_u64(arg: &[u8]) -> Result<u64, Vec<u8>> {
    if arg.is_empty() {
        return Err(resp_error("invalid integer"));
    }
    let mut value: u64 = 0;
    for &b in arg {
        if !b.is_ascii_digit() {
            return Err(resp_error("invalid integer"));
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as u64);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_engine::StoreConfig;

    async fn test_store() -> (tempfile::TempDir, Arc<Store>, kv_engine::StoreHandle) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            capacity: 10,
            log_file: dir.path().join("wal.log"),
            ..StoreConfig::default()
        };
        let handle = Store::initialize(config).await.unwrap();
        let store = handle.store.clone();
        (dir, store, handle)
    }

    #[tokio::test]
    async fn get_on_missing_key_returns_resp_null() {
        let (_dir, store, handle) = test_store().await;
        let response = dispatch_command(&[b"GET".to_vec(), b"missing".to_vec()], &store).await;
        assert_eq!(response, resp_null());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_dispatch() {
        let (_dir, store, handle) = test_store().await;
        let set_response = dispatch_command(&[b"SET".to_vec(), b"k".to_vec(), b"v".to_vec()], &store).await;
        assert_eq!(set_response, resp_simple("OK"));

        let get_response = dispatch_command(&[b"GET".to_vec(), b"k".to_vec()], &store).await;
        assert_eq!(get_response, resp_bulk(b"v"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn get_honors_trailing_namespace_pair() {
        let (_dir, store, handle) = test_store().await;
        dispatch_command(
            &[b"SET".to_vec(), b"u".to_vec(), b"alice".to_vec(), b"NS".to_vec(), b"app1".to_vec()],
            &store,
        )
        .await;
        let response = dispatch_command(
            &[b"GET".to_vec(), b"u".to_vec(), b"NS".to_vec(), b"app1".to_vec()],
            &store,
        )
        .await;
        assert_eq!(response, resp_bulk(b"alice"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_command_is_a_resp_error() {
        let (_dir, store, handle) = test_store().await;
        let response = dispatch_command(&[b"BOGUS".to_vec()], &store).await;
        assert_eq!(response, resp_error("unknown command"));
        handle.shutdown().await;
    }
}
