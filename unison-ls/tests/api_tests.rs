//! Integration tests for unison-ls HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint (no device identity required)
//! - Submission, lookup by id, video id and song/artist
//! - Legacy /getLyrics lookup
//! - Vote, retraction and report status codes
//! - On-demand score update

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::TestDb;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt; // for `oneshot`
use unison_common::ScoringConfig;
use unison_ls::services::ScoreUpdater;
use unison_ls::{build_router, AppState};

fn setup_app(db: &TestDb) -> Router {
    let config = Arc::new(ScoringConfig::default());
    let updater = Arc::new(ScoreUpdater::new(
        db.pool.clone(),
        config.clone(),
        CancellationToken::new(),
    ));
    build_router(AppState::new(db.pool.clone(), config, updater))
}

fn request(method: &str, uri: &str, device: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(device) = device {
        builder = builder.header("X-Device-ID", device);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn submission(video_id: &str) -> Value {
    json!({
        "videoId": video_id,
        "song": "Bohemian Rhapsody",
        "artist": "Queen",
        "duration": 354,
        "lyrics": "Is this the real life?",
        "format": "plain",
        "syncType": "plain"
    })
}

async fn submit(app: &Router, video_id: &str, device: &str) -> i64 {
    let (status, body) = send(
        app,
        request("POST", "/lyrics/submit", Some(device), Some(submission(video_id))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let db = TestDb::new().await;
    let app = setup_app(&db);

    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "unison-ls");
    assert!(body["version"].is_string());
}

// =============================================================================
// Lyrics
// =============================================================================

#[tokio::test]
async fn test_submit_requires_device_id() {
    let db = TestDb::new().await;
    let app = setup_app(&db);

    let (status, body) = send(
        &app,
        request("POST", "/lyrics/submit", None, Some(submission("vid-1"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_submit_then_resubmit() {
    let db = TestDb::new().await;
    let app = setup_app(&db);

    let (status, body) = send(
        &app,
        request("POST", "/lyrics/submit", Some("device-a"), Some(submission("vid-1"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "created");
    assert_eq!(body["updated"], false);
    let id = body["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        request("POST", "/lyrics/submit", Some("device-b"), Some(submission("vid-1"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "updated");
    assert_eq!(body["updated"], true);
    assert_eq!(body["id"], id);
}

#[tokio::test]
async fn test_submit_rejects_invalid_document() {
    let db = TestDb::new().await;
    let app = setup_app(&db);

    let mut bad = submission("vid-1");
    bad["duration"] = json!(0);
    let (status, body) = send(&app, request("POST", "/lyrics/submit", Some("device-a"), Some(bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_lookup_by_id_and_video() {
    let db = TestDb::new().await;
    let app = setup_app(&db);
    let id = submit(&app, "vid-1", "device-a").await;

    let (status, body) = send(&app, request("GET", &format!("/lyrics/{}", id), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["videoId"], "vid-1");
    assert_eq!(body["artist"], "Queen");
    assert_eq!(body["effectiveScore"], 0.0);
    assert_eq!(body["confidence"], "low");

    let (status, body) = send(&app, request("GET", "/lyrics?v=vid-1", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, body) = send(&app, request("GET", "/lyrics/9999", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, request("GET", "/lyrics?v=missing", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lookup_by_song_and_artist() {
    let db = TestDb::new().await;
    let app = setup_app(&db);
    let first = submit(&app, "vid-1", "device-a").await;
    let second = submit(&app, "vid-2", "device-b").await;
    let vote = request("POST", &format!("/lyrics/{}/vote", second), Some("device-c"), Some(json!({"vote": 1})));
    let (status, _) = send(&app, vote).await;
    assert!(status.is_success());

    let uri = "/lyrics?song=bohemian%20rhapsody&artist=QUEEN&duration=355";
    let (status, body) = send(&app, request("GET", uri, None, None)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["id"], second);

    let (status, _) = send(
        &app,
        request("GET", "/lyrics?song=Bohemian%20Rhapsody&artist=Queen&duration=360", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        request("GET", "/lyrics/search?song=Bohemian%20Rhapsody&artist=Queen", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let (status, body) = send(&app, request("GET", "/lyrics?artist=Queen", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = send(&app, request("GET", "/lyrics/search?song=Bohemian", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_legacy_get_lyrics() {
    let db = TestDb::new().await;
    let app = setup_app(&db);
    submit(&app, "vid-1", "device-a").await;

    let (status, body) = send(
        &app,
        request("GET", "/getLyrics?s=Bohemian%20Rhapsody&a=Queen&d=354", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lyrics"], "Is this the real life?");
    assert_eq!(body["format"], "plain");
    assert!(body.get("id").is_none());

    let (status, body) = send(&app, request("GET", "/getLyrics?v=vid-1", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lyrics"], "Is this the real life?");

    let (status, _) = send(&app, request("GET", "/getLyrics?v=vid-9", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("GET", "/getLyrics", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Votes and reports
// =============================================================================

#[tokio::test]
async fn test_vote_lifecycle_status_codes() {
    let db = TestDb::new().await;
    let app = setup_app(&db);
    let id = submit(&app, "vid-1", "author").await;
    let uri = format!("/lyrics/{}/vote", id);

    let (status, body) = send(&app, request("POST", &uri, Some("voter"), Some(json!({"vote": 1})))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&app, request("POST", &uri, Some("voter"), Some(json!({"vote": 1})))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, request("POST", &uri, Some("voter"), Some(json!({"vote": -1})))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, request("POST", &uri, Some("voter"), Some(json!({"vote": 0})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, request("DELETE", &uri, Some("voter"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, request("DELETE", &uri, Some("voter"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vote_on_missing_document() {
    let db = TestDb::new().await;
    let app = setup_app(&db);

    let (status, _) = send(
        &app,
        request("POST", "/lyrics/4242/vote", Some("voter"), Some(json!({"vote": 1}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report_status_codes() {
    let db = TestDb::new().await;
    let app = setup_app(&db);
    let id = submit(&app, "vid-1", "author").await;
    let uri = format!("/lyrics/{}/report", id);

    let report = json!({"reason": "bad_sync", "details": "drifts after the chorus"});
    let (status, body) = send(&app, request("POST", &uri, Some("reporter"), Some(report.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, request("POST", &uri, Some("reporter"), Some(report))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Unknown reason is rejected by the JSON extractor
    let (status, _) = send(
        &app,
        request("POST", &uri, Some("other"), Some(json!({"reason": "boring"}))),
    )
    .await;
    assert!(status.is_client_error());
}

// =============================================================================
// Score update
// =============================================================================

#[tokio::test]
async fn test_score_update_endpoint() {
    let db = TestDb::new().await;
    let app = setup_app(&db);
    let id = submit(&app, "vid-1", "author").await;

    for device in ["a", "b", "c"] {
        let (status, _) = send(
            &app,
            request("POST", &format!("/lyrics/{}/vote", id), Some(device), Some(json!({"vote": 1}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, request("POST", "/scores/update", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected"], 1);
    assert_eq!(body["updated"], 1);
    assert_eq!(body["cancelled"], false);

    let (_, body) = send(&app, request("GET", &format!("/lyrics/{}", id), None, None)).await;
    assert_eq!(body["effectiveScore"], 1.0);
    assert_eq!(body["voteCount"], 3);
    assert_eq!(body["score"], 3);
}
