//! End-to-end tests for the session store against a mocked forwarder.
//!
//! The forwarder is a wiremock server speaking the local `/api/chat` shape;
//! conversation state is persisted to a `FileStore` in a temporary directory.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempo_core::models::Role;
use tempo_core::storage::{MESSAGES_KEY, SESSION_ID_KEY};
use tempo_core::{
    FileStore, ForwarderClient, KeyValueStore, SendError, SessionStore, StaleReplyPolicy,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_store(server: &MockServer, dir: &std::path::Path) -> (SessionStore, Arc<FileStore>) {
    let client = ForwarderClient::new(server.uri(), Duration::from_secs(5))
        .expect("Failed to create forwarder client");
    let files = Arc::new(FileStore::open(dir).expect("Failed to open file store"));
    let store = SessionStore::new(Arc::new(client), files.clone());
    (store, files)
}

// ===========================================================================
// TEST 1: first message of a fresh session adopts the backend session id
// ===========================================================================
#[tokio::test]
async fn test_first_exchange_adopts_session_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "Schedule lunch tomorrow at noon"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"session_id": "abc123", "response": "Done!"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, files) = make_store(&server, dir.path());
    let summary = store.restore().expect("First restore should run");
    assert_eq!(summary.messages, 0);
    assert!(summary.session_id.is_none());

    let reply = store
        .send_message("Schedule lunch tomorrow at noon")
        .await
        .expect("Exchange should succeed");
    assert_eq!(reply.content, "Done!");

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].role, Role::User);
    assert_eq!(state.messages[1].role, Role::Assistant);
    assert_eq!(state.session_id.as_deref(), Some("abc123"));
    assert!(!state.is_loading);
    assert!(state.error.is_none());

    assert_eq!(files.get(SESSION_ID_KEY).unwrap().as_deref(), Some("abc123"));
    let saved: serde_json::Value =
        serde_json::from_str(&files.get(MESSAGES_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(saved[0]["type"], "user");
    assert_eq!(saved[1]["content"], "Done!");
}

// ===========================================================================
// TEST 2: follow-up messages carry the live session id
// ===========================================================================
#[tokio::test]
async fn test_follow_up_carries_session_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "first"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"session_id": "abc123", "response": "one"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "second", "session_id": "abc123"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"session_id": "abc123", "response": "two"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, _files) = make_store(&server, dir.path());
    store.restore();

    store.send_message("first").await.unwrap();
    let reply = store.send_message("second").await.unwrap();
    assert_eq!(reply.content, "two");
    assert_eq!(store.snapshot().messages.len(), 4);
}

// ===========================================================================
// TEST 3: forwarder failure records the error and adds no reply
// ===========================================================================
#[tokio::test]
async fn test_forwarder_failure_sets_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Failed to process chat request",
            "details": "Backend request failed with status 500: boom",
            "timestamp": "2026-03-02T12:00:00Z"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, _files) = make_store(&server, dir.path());
    store.restore();

    let err = store.send_message("hello").await.unwrap_err();
    assert!(matches!(err, SendError::Exchange(_)));

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 1, "Only the user message is kept");
    assert_eq!(
        state.error.as_deref(),
        Some("Backend request failed with status 500: boom")
    );
    assert!(!state.is_loading);
}

// ===========================================================================
// TEST 4: a second store over the same directory restores the conversation
// ===========================================================================
#[tokio::test]
async fn test_restore_after_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"session_id": "s-42", "response": "Booked."})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let original = {
        let (store, _files) = make_store(&server, dir.path());
        store.restore();
        store.send_message("Book the blue room").await.unwrap();
        store.snapshot()
    };

    let (restarted, _files) = make_store(&server, dir.path());
    let summary = restarted.restore().unwrap();
    assert_eq!(summary.messages, 2);
    assert_eq!(summary.session_id.as_deref(), Some("s-42"));
    assert!(!summary.discarded_log);

    let state = restarted.snapshot();
    assert_eq!(state.messages, original.messages);
    assert_eq!(
        state.messages[0].created_at, original.messages[0].created_at,
        "Timestamps survive the round trip"
    );
    assert!(restarted.restore().is_none(), "Restore runs only once");
}

// ===========================================================================
// TEST 5: a corrupt saved log is discarded and the store starts empty
// ===========================================================================
#[tokio::test]
async fn test_corrupt_log_is_discarded() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let (store, files) = make_store(&server, dir.path());
    files.set(MESSAGES_KEY, "[{not json").unwrap();
    files.set(SESSION_ID_KEY, "keep-me").unwrap();

    let summary = store.restore().unwrap();
    assert!(summary.discarded_log);
    assert_eq!(summary.messages, 0);
    assert_eq!(summary.session_id.as_deref(), Some("keep-me"));
    assert!(store.snapshot().messages.is_empty());
}

// ===========================================================================
// TEST 6: starting a new session purges storage; the next send has no id
// ===========================================================================
#[tokio::test]
async fn test_new_session_purges_and_forgets_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "fresh start"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"session_id": "new-1", "response": "Hi again"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, files) = make_store(&server, dir.path());
    files.set(SESSION_ID_KEY, "old-session").unwrap();
    store.restore();
    assert_eq!(store.session_id().as_deref(), Some("old-session"));

    store.start_new_session();
    assert!(files.get(SESSION_ID_KEY).unwrap().is_none());
    assert!(files.get(MESSAGES_KEY).unwrap().is_none());
    assert_eq!(store.snapshot(), Default::default());

    store.send_message("fresh start").await.unwrap();
    assert_eq!(store.session_id().as_deref(), Some("new-1"));
}

// ===========================================================================
// TEST 7: concurrent sends both land, replies appended in completion order
// ===========================================================================
#[tokio::test]
async fn test_concurrent_sends_complete_in_any_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "slow"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({"response": "slow reply"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({"message": "fast"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "fast reply"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, _files) = make_store(&server, dir.path());
    store.restore();

    let (slow, fast) = futures::join!(store.send_message("slow"), store.send_message("fast"));
    assert!(slow.is_ok() && fast.is_ok());

    let contents: Vec<String> = store
        .snapshot()
        .messages
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, ["slow", "fast", "fast reply", "slow reply"]);
}

// ===========================================================================
// TEST 8: Discard policy drops a reply that outlived its session
// ===========================================================================
#[tokio::test]
async fn test_discard_policy_drops_late_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({"session_id": "late", "response": "too late"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, files) = make_store(&server, dir.path());
    let store = store.with_stale_reply_policy(StaleReplyPolicy::Discard);
    store.restore();

    let reset = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.start_new_session();
    };
    let (result, ()) = futures::join!(store.send_message("hello"), reset);

    assert!(matches!(result, Err(SendError::Stale)));
    assert!(store.snapshot().messages.is_empty());
    assert!(store.session_id().is_none());
    assert!(files.get(SESSION_ID_KEY).unwrap().is_none());
}
