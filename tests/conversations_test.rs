//! Integration tests for the conversation REST surface: listing, history,
//! and read-marking.

use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use courier_server::store;

/// Helper: start the server on a random port and return (base_url, db).
/// The db handle lets tests seed messages without going through the
/// WebSocket path.
async fn start_test_server() -> (String, courier_server::db::DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = courier_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = courier_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = courier_server::state::AppState {
        db: db.clone(),
        jwt_secret,
        connections: courier_server::ws::ConnectionRegistry::new(),
    };

    let app = courier_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), db)
}

/// Register a user and return an access token for them.
async fn register_and_login(base_url: &str, username: &str, name: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/register", base_url))
        .json(&json!({ "username": username, "name": name, "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "registration failed for {}", username);

    let resp = client
        .post(format!("{}/token", base_url))
        .json(&json!({ "username": username, "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "login failed for {}", username);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_unread_flow_and_mark_all_read() {
    let (base_url, db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/register", base_url))
        .json(&json!({ "username": "alice", "name": "Alice", "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let bob_token = register_and_login(&base_url, "bob", "Bob").await;

    store::create_message(&db, "alice", "bob", "one").unwrap();
    store::create_message(&db, "alice", "bob", "two").unwrap();
    store::create_message(&db, "bob", "alice", "reply").unwrap();

    // Bob sees one conversation with alice, two unread
    let resp = client
        .get(format!("{}/conversations", base_url))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let conversations: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(conversations.as_array().unwrap().len(), 1);
    assert_eq!(conversations[0]["username"], "alice");
    assert_eq!(conversations[0]["unread_count"], 2);
    assert_eq!(conversations[0]["last_message"], "reply");

    // Bulk mark-read, then the count drops to zero
    let resp = client
        .post(format!("{}/conversations/alice/read", base_url))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{}/conversations", base_url))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    let conversations: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(conversations[0]["unread_count"], 0);
}

#[tokio::test]
async fn test_history_is_ascending() {
    let (base_url, db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/register", base_url))
        .json(&json!({ "username": "alice", "name": "Alice", "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let bob_token = register_and_login(&base_url, "bob", "Bob").await;

    store::create_message(&db, "alice", "bob", "first").unwrap();
    store::create_message(&db, "bob", "alice", "second").unwrap();
    store::create_message(&db, "alice", "bob", "third").unwrap();

    let resp = client
        .get(format!("{}/conversations/alice/messages", base_url))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let history: serde_json::Value = resp.json().await.unwrap();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["text"], "first");
    assert_eq!(history[1]["text"], "second");
    assert_eq!(history[2]["text"], "third");
    assert_eq!(history[0]["is_read"], false);
}

#[tokio::test]
async fn test_mark_single_message_read() {
    let (base_url, db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/register", base_url))
        .json(&json!({ "username": "alice", "name": "Alice", "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let bob_token = register_and_login(&base_url, "bob", "Bob").await;

    let message = store::create_message(&db, "alice", "bob", "hello").unwrap();

    let resp = client
        .post(format!("{}/messages/read", base_url))
        .bearer_auth(&bob_token)
        .json(&json!({ "message_id": message.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let summary: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(summary["username"], "alice");
    assert_eq!(summary["unread_count"], 0);

    // Idempotent: marking again is a no-op success
    let resp = client
        .post(format!("{}/messages/read", base_url))
        .bearer_auth(&bob_token)
        .json(&json!({ "message_id": message.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Unknown message id is NotFound
    let resp = client
        .post(format!("{}/messages/read", base_url))
        .bearer_auth(&bob_token)
        .json(&json!({ "message_id": 99999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
