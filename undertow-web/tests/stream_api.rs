//! End-to-end tests of the delivery surface over an in-memory swarm
//! backend and a fixed resolver source.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use tower::ServiceExt;
use undertow_core::config::UndertowConfig;
use undertow_core::streaming::MediaPipeline;
use undertow_core::swarm::{MediaEntry, MemorySwarmConnector, SwarmCache, SwarmDescriptor};
use undertow_resolve::{ResolveError, ResolverChain, StreamKey, TorrentIndex};
use undertow_web::{AppState, router, serve_until};

const HASH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const MOVIE_LEN: usize = 4096;
const SRT: &str = "1\n00:00:01,000 --> 00:00:04,000\nHello\n\n2\n00:00:05,000 --> 00:00:06,500\nWorld\n";

#[derive(Debug)]
struct FixedIndex;

#[async_trait]
impl TorrentIndex for FixedIndex {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn lookup(&self, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError> {
        Ok(Some(SwarmDescriptor::from_info_hash(HASH, &key.title).unwrap()))
    }
}

fn movie_bytes() -> Bytes {
    Bytes::from((0..MOVIE_LEN).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

fn full_connector() -> Arc<MemorySwarmConnector> {
    let movie = movie_bytes();
    Arc::new(MemorySwarmConnector::new(vec![
        (MediaEntry::new("movie.mp4", movie.len() as u64), movie),
        (
            MediaEntry::new("movie.srt", SRT.len() as u64),
            Bytes::from_static(SRT.as_bytes()),
        ),
    ]))
}

fn state_with(
    sources: Vec<Box<dyn TorrentIndex>>,
    connector: Arc<MemorySwarmConnector>,
) -> AppState {
    let config = UndertowConfig::default();
    let swarms = Arc::new(SwarmCache::new(
        connector,
        config.cache.clone(),
        config.swarm.connect_timeout,
    ));
    let resolver = Arc::new(ResolverChain::new(sources, &config.resolver));
    let pipeline = Arc::new(MediaPipeline::new(config.swarm.read_chunk_size));
    AppState::new(resolver, swarms, pipeline, config)
}

fn test_state(sources: Vec<Box<dyn TorrentIndex>>) -> AppState {
    state_with(sources, full_connector())
}

fn ready_state() -> AppState {
    test_state(vec![Box::new(FixedIndex)])
}

fn stream_request(range: Option<&str>, user_agent: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/stream?id=tt0111161&title=Movie&quality=720p")
        .header(header::USER_AGENT, user_agent);
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    builder.body(Body::empty()).unwrap()
}

const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux) Firefox/121.0";
const IOS_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Safari/604.1";

#[tokio::test]
async fn test_ranged_request_delivers_exact_window() {
    let app = router(ready_state());
    let response = app
        .oneshot(stream_request(Some("bytes=10-19"), DESKTOP_UA))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 10-19/4096"
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body, movie_bytes().slice(10..20));
}

#[tokio::test]
async fn test_open_range_clamps_to_file_end() {
    let app = router(ready_state());
    let response = app
        .oneshot(stream_request(Some("bytes=100-"), DESKTOP_UA))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 100-4095/4096"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.len(), MOVIE_LEN - 100);
}

#[tokio::test]
async fn test_desktop_without_range_is_bad_request() {
    let app = router(ready_state());
    let response = app.oneshot(stream_request(None, DESKTOP_UA)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ios_without_range_gets_full_file() {
    let app = router(ready_state());
    let response = app.oneshot(stream_request(None, IOS_UA)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "4096");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body, movie_bytes());
}

#[tokio::test]
async fn test_range_beyond_eof_is_unsatisfiable() {
    let app = router(ready_state());
    let response = app
        .oneshot(stream_request(Some("bytes=5000-"), DESKTOP_UA))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */4096");
}

#[tokio::test]
async fn test_resolution_failure_is_bad_gateway() {
    let app = router(test_state(Vec::new()));
    let response = app
        .oneshot(stream_request(Some("bytes=0-99"), DESKTOP_UA))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_subtitle_is_converted_to_vtt() {
    let app = router(ready_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/subtitle?id=tt0111161&title=Movie")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/vtt; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=3600"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("WEBVTT\n\n"));
    assert!(text.contains("00:00:01.000 --> 00:00:04.000"));
    assert!(text.contains("00:00:05.000 --> 00:00:06.500"));
    assert!(text.contains("Hello"));
    assert!(text.contains("World"));
    assert!(!text.contains(','));
}

#[tokio::test]
async fn test_subtitle_missing_is_404_with_empty_body() {
    let movie = movie_bytes();
    let connector = Arc::new(MemorySwarmConnector::new(vec![(
        MediaEntry::new("movie.mp4", movie.len() as u64),
        movie,
    )]));
    let app = router(state_with(vec![Box::new(FixedIndex)], connector));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/subtitle?id=tt0111161&title=Movie")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_subtitle_connect_failure_is_404() {
    let connector = full_connector();
    connector.fail_next_connects(1);
    let app = router(state_with(vec![Box::new(FixedIndex)], connector));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/subtitle?id=tt0111161&title=Movie")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_prepare_warms_cache_and_reports_ready() {
    let state = ready_state();
    let app = router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/stream/prepare")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"id":"tt0111161","title":"Movie","quality":"720p"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["ready"], true);
    assert_eq!(state.swarms.active_sessions().await, 1);
}

#[tokio::test]
async fn test_prepare_failure_is_json_error() {
    let app = router(test_state(Vec::new()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/stream/prepare")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"id":"tt0111161","title":"Movie","quality":"720p"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(value["error"].is_string());
}

#[tokio::test]
async fn test_health_reports_uptime_and_sessions() {
    let app = router(ready_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["active_sessions"], 0);
}

#[tokio::test]
async fn test_server_shutdown_tears_down_sessions() {
    let state = ready_state();
    let descriptor = SwarmDescriptor::from_info_hash(HASH, "Movie").unwrap();
    state.swarms.get_or_create(&descriptor).await.unwrap();
    assert_eq!(state.swarms.active_sessions().await, 1);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_until(listener, state.clone(), async {
        let _ = stop_rx.await;
    }));

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    // TTL had not expired; teardown happens anyway
    assert_eq!(state.swarms.active_sessions().await, 0);
    assert!(state.swarms.get_or_create(&descriptor).await.is_err());
}
