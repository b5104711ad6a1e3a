//! Integration tests for cross-node invalidation.
//!
//! Each `DistributedTtlLru` plays one node; nodes share an in-process
//! `MemoryTransport` the way real deployments share a Redis broker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use disttl::{
    DistributedTtlLru, InvalidationReport, InvalidationTransport, ListenerState, MemoryTransport,
};
use tokio::sync::watch;

const HOUR: Duration = Duration::from_secs(3600);

fn node(transport: &Arc<MemoryTransport>, scope: &str) -> DistributedTtlLru<String> {
    DistributedTtlLru::new(
        100,
        scope,
        Arc::clone(transport) as Arc<dyn InvalidationTransport>,
    )
    .expect("valid capacity")
}

/// Poll until `condition` holds or a second has passed.
async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_signal_propagates_to_every_node() {
    let transport = Arc::new(MemoryTransport::new());
    let node1 = node(&transport, "shared:");
    let node2 = node(&transport, "shared:");
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    node1.start(shutdown_rx.clone()).await.unwrap();
    node2.start(shutdown_rx).await.unwrap();

    node1.set("x", "x1".into(), HOUR, ["T"]);
    node1.set("keep1", "k1".into(), HOUR, ["U"]);
    node2.set("y", "y2".into(), HOUR, ["T", "V"]);
    node2.set("keep2", "k2".into(), HOUR, Vec::<String>::new());

    node1.update_signal(&["T"]).await.unwrap();

    assert!(eventually(|| node1.get("x").is_none() && node2.get("y").is_none()).await);
    assert_eq!(node1.get("keep1").as_deref(), Some("k1"));
    assert_eq!(node2.get("keep2").as_deref(), Some("k2"));
}

#[tokio::test]
async fn test_scopes_do_not_interfere() {
    let transport = Arc::new(MemoryTransport::new());
    let orders = node(&transport, "orders:");
    let users = node(&transport, "users:");
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    orders.start(shutdown_rx.clone()).await.unwrap();
    users.start(shutdown_rx).await.unwrap();

    orders.set("o", "1".into(), HOUR, ["T"]);
    users.set("u", "1".into(), HOUR, ["T"]);

    orders.update_signal(&["T"]).await.unwrap();

    assert!(eventually(|| orders.get("o").is_none()).await);
    // The users scope never saw the signal.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(users.get("u").is_some());
}

#[tokio::test]
async fn test_repeated_signal_is_idempotent() {
    let transport = Arc::new(MemoryTransport::new());
    let reports = Arc::new(Mutex::new(Vec::<InvalidationReport>::new()));
    let sink = Arc::clone(&reports);
    let cache = node(&transport, "s:").with_observer(move |report: &InvalidationReport| {
        sink.lock().unwrap().push(report.clone());
    });
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    cache.start(shutdown_rx).await.unwrap();

    cache.set("k", "v".into(), HOUR, ["A"]);
    cache.set("j", "v".into(), HOUR, ["B"]);

    cache.update_signal(&["A"]).await.unwrap();
    cache.update_signal(&["A"]).await.unwrap();

    assert!(eventually(|| reports.lock().unwrap().len() == 2).await);
    let affected: Vec<usize> = reports.lock().unwrap().iter().map(|r| r.affected()).collect();
    assert_eq!(affected, vec![1, 0]);
    assert_eq!(cache.size(), (1, 100));
    assert!(cache.get("j").is_some());
}

#[tokio::test]
async fn test_tag_with_delimiter_is_split_on_receipt() {
    let transport = Arc::new(MemoryTransport::new());
    let reports = Arc::new(Mutex::new(Vec::<InvalidationReport>::new()));
    let sink = Arc::clone(&reports);
    let cache = node(&transport, "s:").with_observer(move |report: &InvalidationReport| {
        sink.lock().unwrap().push(report.clone());
    });
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    cache.start(shutdown_rx).await.unwrap();

    // Tagged with the literal token, and with one of the fragments.
    cache.set("whole", "v".into(), HOUR, ["user@@1"]);
    cache.set("fragment", "v".into(), HOUR, ["user"]);

    cache.update_signal(&["user@@1"]).await.unwrap();

    assert!(eventually(|| !reports.lock().unwrap().is_empty()).await);
    let report = reports.lock().unwrap()[0].clone();
    assert_eq!(report.tags, vec!["user".to_string(), "1".to_string()]);
    // The split tokens miss the published tag and hit an unrelated one.
    assert!(cache.get("whole").is_some());
    assert!(cache.get("fragment").is_none());
}

#[tokio::test]
async fn test_ttl_expiry_is_independent_of_signals() {
    let transport = Arc::new(MemoryTransport::new());
    let cache = node(&transport, "s:");

    cache.set("a", "v".into(), Duration::from_millis(10), ["A"]);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.size(), (1, 100));
}

#[tokio::test]
async fn test_capacity_bound_across_writes() {
    let transport = Arc::new(MemoryTransport::new());
    let cache = DistributedTtlLru::<u32>::new(
        3,
        "s:",
        Arc::clone(&transport) as Arc<dyn InvalidationTransport>,
    )
    .unwrap();

    for i in 0..5u32 {
        cache.set(format!("k{i}"), i, HOUR, ["T"]);
    }

    assert_eq!(cache.size(), (3, 3));
    assert_eq!(cache.get("k0"), None);
    assert_eq!(cache.get("k1"), None);
    assert_eq!(cache.get("k4"), Some(4));
}

#[tokio::test]
async fn test_stopped_node_no_longer_applies_signals() {
    let transport = Arc::new(MemoryTransport::new());
    let node1 = node(&transport, "shared:");
    let node2 = node(&transport, "shared:");
    let (tx1, rx1) = watch::channel(false);
    let (_tx2, rx2) = watch::channel(false);
    let handle1 = node1.start(rx1).await.unwrap();
    node2.start(rx2).await.unwrap();

    tx1.send(true).unwrap();
    handle1.await.unwrap();
    assert_eq!(node1.state(), ListenerState::Stopped);
    assert_eq!(node2.state(), ListenerState::Listening);

    node1.set("k", "v".into(), HOUR, ["T"]);
    node2.set("k", "v".into(), HOUR, ["T"]);
    node1.update_signal(&["T"]).await.unwrap();

    assert!(eventually(|| node2.get("k").is_none()).await);
    assert!(node1.get("k").is_some());
}
