/// Resolver HTTP tests
/// Drives the router in-process with a canned extractor
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use music_relay::{
    protocol::{PlayResponse, QueueEntry, QueueResponse},
    resolver::{
        error::{ResolveError, Result},
        routes, DurationPolicy, MediaExtractor, MediaInfo, Resolver,
    },
    sources::{ResolverClient, ResolverClientError},
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::util::ServiceExt;

/// Answers direct URLs by their last path segment and searches with a fixed hit.
struct CannedExtractor;

fn media(title: &str, duration: f64) -> MediaInfo {
    MediaInfo {
        title: Some(title.to_string()),
        url: Some(format!("https://cdn.example/{}.webm", title)),
        thumbnail: Some(format!("https://img.example/{}.jpg", title)),
        uploader: Some("Uploader".to_string()),
        duration: Some(duration),
    }
}

#[async_trait]
impl MediaExtractor for CannedExtractor {
    async fn extract(&self, url: &str) -> Result<MediaInfo> {
        match url.rsplit('/').next() {
            Some("long") => Ok(media("long", 1801.0)),
            Some("edge") => Ok(media("edge", 1800.0)),
            Some("broken") => Err(ResolveError::Extraction(
                "ERROR: Unsupported URL".to_string(),
            )),
            _ => Ok(media("short", 200.0)),
        }
    }

    async fn search_first(&self, query: &str) -> Result<MediaInfo> {
        if query == "nothing" {
            return Err(ResolveError::NoResults(query.to_string()));
        }
        Ok(media("marathon", 10_000.0))
    }
}

fn create_test_app() -> Router {
    let resolver = Resolver::new(Arc::new(CannedExtractor), DurationPolicy::default());
    routes::router(Arc::new(resolver))
}

fn play_request(query: &str, guild_id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/play")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "query": query, "guild_id": guild_id, "user": "listener" }).to_string(),
        ))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_direct_url_over_limit_is_rejected() {
    let app = create_test_app();

    let response = app
        .oneshot(play_request("https://video.example/long", "1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "status": "error", "message": "The audio is longer than 30 minutes." })
    );
}

#[tokio::test]
async fn test_direct_url_at_limit_succeeds() {
    let app = create_test_app();

    let response = app
        .oneshot(play_request("https://video.example/edge", "1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed: PlayResponse = serde_json::from_value(body_json(response).await).unwrap();
    match parsed {
        PlayResponse::Success {
            title, audio_url, ..
        } => {
            assert_eq!(title, "edge");
            assert!(!audio_url.is_empty());
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_search_has_no_duration_limit() {
    let app = create_test_app();

    let response = app
        .oneshot(play_request("ten hour marathon", "1"))
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({
            "status": "success",
            "title": "marathon",
            "thumbnail": "https://img.example/marathon.jpg",
            "audio_url": "https://cdn.example/marathon.webm",
        })
    );
}

#[tokio::test]
async fn test_extraction_failures_become_error_payloads() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(play_request("https://video.example/broken", "1"))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "status": "error", "message": "ERROR: Unsupported URL" })
    );

    let response = app.oneshot(play_request("nothing", "1")).await.unwrap();
    assert_eq!(body_json(response).await["status"], "error");
}

#[tokio::test]
async fn test_malformed_body_is_rejected_by_framework() {
    let app = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/play")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"query":"missing fields"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_queue_mirror_records_successes_per_guild() {
    let app = create_test_app();

    for (query, guild) in [
        ("https://video.example/short", "7"),
        ("https://video.example/long", "7"),
        ("some search", "7"),
        ("https://video.example/short", "8"),
    ] {
        app.clone().oneshot(play_request(query, guild)).await.unwrap();
    }

    let request = Request::builder()
        .uri("/queue/7")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let queue: QueueResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(
        queue.queue,
        vec![
            QueueEntry(
                "https://cdn.example/short.webm".into(),
                "short".into(),
                "https://img.example/short.jpg".into(),
                "listener".into(),
            ),
            QueueEntry(
                "https://cdn.example/marathon.webm".into(),
                "marathon".into(),
                "https://img.example/marathon.jpg".into(),
                "listener".into(),
            ),
        ]
    );

    let request = Request::builder()
        .uri("/queue/999")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(body_json(response).await, json!({ "queue": [] }));
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_test_app()).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_client_round_trip() {
    let base_url = spawn_server().await;
    let client = ResolverClient::new(&base_url, Duration::from_secs(5)).unwrap();

    let track = client.resolve("https://video.example/short", 42, "listener").await.unwrap();
    assert_eq!(track.title, "short");
    assert_eq!(track.audio_url, "https://cdn.example/short.webm");

    let err = client
        .resolve("https://video.example/long", 42, "listener")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverClientError::Rejected(_)));
    assert_eq!(err.user_message(), "The audio is longer than 30 minutes.");

    let mirror: QueueResponse = reqwest::get(format!("{}/queue/42", base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mirror.queue.len(), 1);
}

#[tokio::test]
async fn test_client_reports_unreachable_resolver() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ResolverClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = client.resolve("anything", 1, "listener").await.unwrap_err();

    assert!(matches!(err, ResolverClientError::Network(_)));
    assert_eq!(err.user_message(), "An error occurred while processing your request.");
}
