use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::Row;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;
use tower::util::ServiceExt;

use hahadog::api::{AppState, router};
use hahadog::core::config::AppConfig;
use hahadog::emoji::backend::GenerationBackend;
use hahadog::emoji::client::EmojiClient;
use hahadog::errors::BotError;
use hahadog::line::LineClient;
use hahadog::line::signature::{compute_signature, verify_line_signature};
use hahadog::storage::Analytics;

const CHANNEL_SECRET: &str = "test-channel-secret";

// Nothing listens here, so reply attempts fail with an immediate
// connection refusal instead of reaching the real platform.
const DEAD_REPLY_URL: &str = "http://127.0.0.1:9/reply";

struct CountingBackend {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingBackend {
    fn ok() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), fail: false })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), fail: true })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for CountingBackend {
    async fn generate(&self, _input: &str, _token: &str) -> Result<Value, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Ok(json!({"error": "model overloaded"}))
        } else {
            Ok(json!([{"generated_text": "😀"}]))
        }
    }
}

fn test_state(backend: Arc<CountingBackend>, analytics: Option<Analytics>) -> Arc<AppState> {
    let config = AppConfig {
        channel_secret: CHANNEL_SECRET.to_string(),
        channel_access_token: "test-access-token".to_string(),
        emoji_api_url: "http://127.0.0.1:9/unused".to_string(),
        emoji_api_tokens: vec!["t0".to_string()],
        database_url: None,
        workers: 2,
        sentence_limit: 10,
        keep_alive_interval_secs: 300,
        reply_timeout_secs: 5,
    };

    let emoji = Arc::new(EmojiClient::new(
        backend,
        config.emoji_api_tokens.clone(),
        config.workers,
        config.sentence_limit,
    ));
    let line = LineClient::with_endpoint(
        config.channel_access_token.clone(),
        DEAD_REPLY_URL.to_string(),
    )
    .unwrap();

    Arc::new(AppState { config, emoji, line, analytics })
}

fn signed_request(body: &str) -> Request<Body> {
    let signature = compute_signature(body, CHANNEL_SECRET);
    Request::builder()
        .method("POST")
        .uri("/callback")
        .header("x-line-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn mention_message_body() -> String {
    json!({
        "events": [{
            "type": "message",
            "replyToken": "rt-1",
            "source": {"type": "group", "groupId": "G1", "userId": "U1"},
            "message": {"type": "text", "id": "m1", "text": "@哈哈狗 你好"}
        }]
    })
    .to_string()
}

async fn feedback_row_count(database_url: &str) -> i64 {
    let pool = SqlitePoolOptions::new().connect(database_url).await.unwrap();
    let row = sqlx::query("SELECT COUNT(*) AS n FROM feedback")
        .fetch_one(&pool)
        .await
        .unwrap();
    row.try_get("n").unwrap()
}

#[test]
fn test_signature_round_trip() {
    let body = r#"{"events":[]}"#;
    let signature = compute_signature(body, CHANNEL_SECRET);
    assert!(verify_line_signature(body, &signature, CHANNEL_SECRET));
    assert!(!verify_line_signature(body, &signature, "other-secret"));
    assert!(!verify_line_signature(r#"{"events":[{}]}"#, &signature, CHANNEL_SECRET));
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_before_processing() {
    let backend = CountingBackend::ok();
    let state = test_state(Arc::clone(&backend), None);

    let request = Request::builder()
        .method("POST")
        .uri("/callback")
        .header("x-line-signature", "bm90LXRoZS1yaWdodC1zaWduYXR1cmU=")
        .body(Body::from(mention_message_body()))
        .unwrap();

    let response = router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Invalid signature");

    // Fail closed: no event processing, no backend traffic.
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_malformed_payload_with_valid_signature_is_bad_request() {
    let backend = CountingBackend::ok();
    let state = test_state(backend, None);

    let response = router(state)
        .oneshot(signed_request("not json at all"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Malformed payload");
}

#[tokio::test]
async fn test_message_without_mention_is_ignored() {
    let backend = CountingBackend::ok();
    let state = test_state(Arc::clone(&backend), None);

    let body = json!({
        "events": [{
            "type": "message",
            "replyToken": "rt-2",
            "source": {"type": "group", "groupId": "G1", "userId": "U1"},
            "message": {"type": "text", "id": "m2", "text": "大家早安"}
        }]
    })
    .to_string();

    let response = router(state).oneshot(signed_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_unknown_event_kinds_are_tolerated() {
    let backend = CountingBackend::ok();
    let state = test_state(backend, None);

    let body = json!({
        "events": [
            {"type": "memberJoined"},
            {"type": "unfollow", "source": {"type": "user", "userId": "U9"}}
        ]
    })
    .to_string();

    let response = router(state).oneshot(signed_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_broken_analytics_store_does_not_block_replies() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("analytics.db").display());
    let analytics = Analytics::connect(&url).await.unwrap();

    // Break the store under the live pool; every subsequent statement fails
    // with "no such table".
    let admin = SqlitePoolOptions::new().connect(&url).await.unwrap();
    for table in ["feedback", "groups", "users"] {
        sqlx::query(&format!("DROP TABLE {table}"))
            .execute(&admin)
            .await
            .unwrap();
    }

    let backend = CountingBackend::ok();
    let state = test_state(Arc::clone(&backend), Some(analytics));

    let response = router(state)
        .oneshot(signed_request(&mention_message_body()))
        .await
        .unwrap();

    // The user/group upserts and the feedback insert all fail, but the
    // message is still generated and the handler still answers 200.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(backend.calls() >= 1, "generation must still run");
}

#[tokio::test]
async fn test_successful_generation_records_feedback() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("analytics.db").display());
    let analytics = Analytics::connect(&url).await.unwrap();

    let backend = CountingBackend::ok();
    let state = test_state(backend, Some(analytics));

    let response = router(state)
        .oneshot(signed_request(&mention_message_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(feedback_row_count(&url).await, 1);
}

#[tokio::test]
async fn test_failed_generation_records_no_feedback() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("analytics.db").display());
    let analytics = Analytics::connect(&url).await.unwrap();

    let backend = CountingBackend::failing();
    let state = test_state(Arc::clone(&backend), Some(analytics));

    let response = router(state)
        .oneshot(signed_request(&mention_message_body()))
        .await
        .unwrap();

    // The canned overloaded reply is not model output; it must not land in
    // the feedback table.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(backend.calls() >= 1);
    assert_eq!(feedback_row_count(&url).await, 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let backend = CountingBackend::ok();
    let state = test_state(backend, None);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
