//! Unit-level tests for the connection registry: single-entry invariant,
//! last-connect-wins supersession, idempotent disconnect, lazy eviction.

use axum::extract::ws::Message;
use std::time::Duration;
use tokio::sync::mpsc;

use courier_server::ws::{ConnectionRegistry, SendOutcome};

fn handle() -> (
    mpsc::UnboundedSender<Message>,
    mpsc::UnboundedReceiver<Message>,
) {
    mpsc::unbounded_channel()
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<Message> {
    tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn connect_supersedes_prior_entry() {
    let registry = ConnectionRegistry::new();
    let (tx1, mut rx1) = handle();
    let (tx2, mut rx2) = handle();

    registry.connect("alice", tx1).unwrap();
    registry.connect("alice", tx2).unwrap();

    // Exactly one entry remains
    assert_eq!(registry.len(), 1);

    // The first handle was closed
    match recv(&mut rx1).await {
        Some(Message::Close(_)) => {}
        other => panic!("expected close frame on superseded handle, got {:?}", other),
    }

    // Sends go to the new handle only
    assert_eq!(
        registry.send("alice", Message::Text("hi".into())),
        SendOutcome::Delivered
    );
    match recv(&mut rx2).await {
        Some(Message::Text(text)) => assert_eq!(text.as_str(), "hi"),
        other => panic!("expected text frame on new handle, got {:?}", other),
    }
    assert!(recv(&mut rx1).await.is_none(), "old handle must not receive");
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let registry = ConnectionRegistry::new();
    let (tx, _rx) = handle();

    registry.connect("alice", tx).unwrap();
    registry.disconnect("alice");
    registry.disconnect("alice");
    registry.disconnect("nobody");

    assert!(registry.is_empty());
    assert!(!registry.is_connected("alice"));
}

#[tokio::test]
async fn send_to_absent_user_is_not_connected() {
    let registry = ConnectionRegistry::new();
    assert_eq!(
        registry.send("ghost", Message::Text("hi".into())),
        SendOutcome::NotConnected
    );
}

#[tokio::test]
async fn stale_entry_is_lazily_evicted() {
    let registry = ConnectionRegistry::new();
    let (tx, rx) = handle();

    registry.connect("alice", tx).unwrap();
    assert!(registry.is_connected("alice"));

    // Receiver gone: the entry is stale, not connected
    drop(rx);
    assert!(!registry.is_connected("alice"));
    assert!(registry.is_empty(), "stale entry should be evicted");
}

#[tokio::test]
async fn send_on_stale_entry_reports_not_connected() {
    let registry = ConnectionRegistry::new();
    let (tx, rx) = handle();

    registry.connect("alice", tx).unwrap();
    drop(rx);

    assert_eq!(
        registry.send("alice", Message::Text("hi".into())),
        SendOutcome::NotConnected
    );
    assert!(registry.is_empty(), "stale entry should be evicted on send");
}

#[tokio::test]
async fn connect_rejects_closed_handle() {
    let registry = ConnectionRegistry::new();
    let (tx, rx) = handle();
    drop(rx);

    assert!(registry.connect("alice", tx).is_err());
    assert!(registry.is_empty(), "no entry installed for rejected handle");
}

#[tokio::test]
async fn superseded_actor_cleanup_keeps_replacement() {
    let registry = ConnectionRegistry::new();
    let (tx1, _rx1) = handle();
    let (tx2, mut rx2) = handle();

    let epoch1 = registry.connect("alice", tx1).unwrap();
    let _epoch2 = registry.connect("alice", tx2).unwrap();

    // The superseded actor's teardown must not evict the new connection
    registry.disconnect_epoch("alice", epoch1);
    assert!(registry.is_connected("alice"));

    assert_eq!(
        registry.send("alice", Message::Text("still here".into())),
        SendOutcome::Delivered
    );
    match recv(&mut rx2).await {
        Some(Message::Text(text)) => assert_eq!(text.as_str(), "still here"),
        other => panic!("expected text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_sends_do_not_cross_users() {
    let registry = ConnectionRegistry::new();
    let (tx_a, mut rx_a) = handle();
    let (tx_b, mut rx_b) = handle();

    registry.connect("alice", tx_a).unwrap();
    registry.connect("bob", tx_b).unwrap();

    let r1 = registry.clone();
    let r2 = registry.clone();
    let h1 = tokio::spawn(async move {
        for i in 0..50 {
            r1.send("alice", Message::Text(format!("a{}", i).into()));
        }
    });
    let h2 = tokio::spawn(async move {
        for i in 0..50 {
            r2.send("bob", Message::Text(format!("b{}", i).into()));
        }
    });
    h1.await.unwrap();
    h2.await.unwrap();

    for _ in 0..50 {
        match recv(&mut rx_a).await {
            Some(Message::Text(text)) => assert!(text.as_str().starts_with('a')),
            other => panic!("expected text frame for alice, got {:?}", other),
        }
        match recv(&mut rx_b).await {
            Some(Message::Text(text)) => assert!(text.as_str().starts_with('b')),
            other => panic!("expected text frame for bob, got {:?}", other),
        }
    }
}
