//! End-to-end tests driving a real `kv-server` instance over TCP with the
//! blocking `kv-client`, covering the capacity-eviction and
//! namespace-isolation scenarios.

use std::sync::Arc;
use std::time::Duration;

use kv_client::KVClient;
use kv_engine::{Store, StoreConfig};
use tokio::net::TcpListener;

async fn spawn_server(config: StoreConfig) -> (String, kv_engine::StoreHandle) {
    let handle = Store::initialize(config).await.expect("initialize store");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    let store = handle.store.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let store = store.clone();
            tokio::spawn(async move {
                let _ = kv_server::server::handle_connection(stream, store).await;
            });
        }
    });

    (addr, handle)
}

fn blocking_client(addr: &str) -> KVClient {
    KVClient::connect(addr).expect("connect")
}

#[tokio::test]
async fn capacity_eviction_keeps_most_recently_used() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        capacity: 2,
        log_file: dir.path().join("wal.log"),
        ..StoreConfig::default()
    };
    let (addr, handle) = spawn_server(config).await;

    let client_task = tokio::task::spawn_blocking(move || {
        let client = blocking_client(&addr);
        client.set(b"a", b"1", None).unwrap();
        client.set(b"b", b"2", None).unwrap();
        client.get(b"a", None).unwrap();
        client.set(b"c", b"3", None).unwrap();

        assert_eq!(client.get(b"b", None).unwrap(), None);
        assert_eq!(client.get(b"a", None).unwrap(), Some(b"1".to_vec()));
        assert_eq!(client.get(b"c", None).unwrap(), Some(b"3".to_vec()));
    });

    client_task.await.unwrap();
    handle.shutdown().await;
}

#[tokio::test]
async fn namespaces_isolate_identical_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        log_file: dir.path().join("wal.log"),
        ..StoreConfig::default()
    };
    let (addr, handle) = spawn_server(config).await;

    let client_task = tokio::task::spawn_blocking(move || {
        let client = blocking_client(&addr);
        client.set(b"u", b"alice", Some("app1")).unwrap();
        client.set(b"u", b"bob", Some("app2")).unwrap();

        assert_eq!(client.get(b"u", Some("app1")).unwrap(), Some(b"alice".to_vec()));
        assert_eq!(client.get(b"u", Some("app2")).unwrap(), Some(b"bob".to_vec()));

        let mut namespaces = client.list_namespaces().unwrap();
        namespaces.sort();
        assert_eq!(namespaces, vec!["app1".to_string(), "app2".to_string()]);
    });

    client_task.await.unwrap();
    handle.shutdown().await;
}

#[tokio::test]
async fn zero_second_ttl_expires_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        log_file: dir.path().join("wal.log"),
        cleanup_interval: Duration::from_secs(3600),
        ..StoreConfig::default()
    };
    let (addr, handle) = spawn_server(config).await;

    let client_task = tokio::task::spawn_blocking(move || {
        let client = blocking_client(&addr);
        client.set_with_ttl(b"k", b"v", Duration::from_secs(0), None).unwrap();
        assert_eq!(client.get(b"k", None).unwrap(), None);
    });

    client_task.await.unwrap();
    handle.shutdown().await;
}

#[test]
fn store_arc_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Arc<Store>>();
}
