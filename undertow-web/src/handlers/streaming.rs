//! Media delivery handlers: ranged streaming and cache warm-up.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::{info, warn};
use undertow_core::streaming::is_direct_play;
use undertow_core::swarm::SelectedMedia;
use undertow_resolve::StreamKey;

use super::range::{chunk_size_for, is_range_mandatory, parse_range_header, resolve_window};
use crate::server::AppState;

/// Query parameters identifying one stream.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// External content identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Requested quality label
    #[serde(default = "default_quality")]
    pub quality: String,
}

/// Warm-up request body.
#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    pub id: String,
    pub title: String,
    #[serde(default = "default_quality")]
    pub quality: String,
}

fn default_quality() -> String {
    "720p".to_string()
}

/// `GET /stream` - ranged media delivery.
///
/// Resolves the key, attaches to the swarm, selects the playable file
/// and streams the requested window through the transform pipeline.
/// Clients outside the range-mandatory class must send a `Range`
/// header; open-ended ranges are answered with a bounded chunk.
pub async fn stream_media(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Response {
    let key = StreamKey::new(&query.id, &query.title, &query.quality);

    let descriptor = match state.resolver.resolve(&key).await {
        Ok(descriptor) => descriptor,
        Err(error) => {
            warn!(key = %key, %error, "resolution failed");
            return (StatusCode::BAD_GATEWAY, "no torrent source produced a result").into_response();
        }
    };

    let (session, media) = match state.swarms.select_media(&descriptor).await {
        Ok((session, Some(media))) => (session, media),
        Ok((_, None)) => {
            return (StatusCode::NOT_FOUND, "no playable media file in swarm").into_response();
        }
        Err(error) => {
            warn!(descriptor = %descriptor, %error, "swarm session unavailable");
            return (StatusCode::BAD_GATEWAY, "swarm session unavailable").into_response();
        }
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let range_mandatory = is_range_mandatory(user_agent);

    let parsed_range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range_header);

    let Some((start, requested_end)) = parsed_range else {
        // Desktop players always send Range; serving them whole files
        // is wasteful. The mobile Safari family cannot, so it gets the
        // full 200.
        if !range_mandatory {
            return (StatusCode::BAD_REQUEST, "Range header required").into_response();
        }

        info!(key = %key, media = %media.name, "serving full file to range-mandatory client");
        let stream =
            state
                .pipeline
                .open(session, media.entry_index, 0..media.length, &media.extension);

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type_for(&media.extension))
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(
                "Access-Control-Expose-Headers",
                "Content-Range, Content-Length, Accept-Ranges",
            );
        // Remuxed output has an unknowable length; only passthrough
        // declares one.
        if is_direct_play(&media.extension) {
            response = response.header(header::CONTENT_LENGTH, media.length);
        }
        return finalize(response, Body::from_stream(stream));
    };

    let chunk_size = chunk_size_for(&state.config.http, range_mandatory);
    let window = match resolve_window(start, requested_end, media.length, chunk_size) {
        Ok(window) => window,
        Err(status) => return unsatisfiable(status, &media),
    };

    info!(
        key = %key,
        media = %media.name,
        range = %window.content_range(),
        "serving range"
    );

    let stream = state.pipeline.open(
        session,
        media.entry_index,
        window.byte_range(),
        &media.extension,
    );

    let mut response = Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type_for(&media.extension))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_RANGE, window.content_range())
        .header(header::CACHE_CONTROL, "no-cache")
        .header(
            "Access-Control-Expose-Headers",
            "Content-Range, Content-Length, Accept-Ranges",
        );
    if is_direct_play(&media.extension) {
        response = response.header(header::CONTENT_LENGTH, window.content_length());
    }
    finalize(response, Body::from_stream(stream))
}

/// `POST /stream/prepare` - resolve and attach without serving bytes.
///
/// Used by players to warm the caches before starting playback.
pub async fn prepare_stream(
    State(state): State<AppState>,
    Json(request): Json<PrepareRequest>,
) -> Response {
    let key = StreamKey::new(&request.id, &request.title, &request.quality);

    let descriptor = match state.resolver.resolve(&key).await {
        Ok(descriptor) => descriptor,
        Err(error) => {
            warn!(key = %key, %error, "prepare: resolution failed");
            return prepare_error();
        }
    };

    match state.swarms.select_media(&descriptor).await {
        Ok((_, selected)) => {
            info!(key = %key, ready = selected.is_some(), "stream prepared");
            Json(serde_json::json!({ "ready": selected.is_some() })).into_response()
        }
        Err(error) => {
            warn!(descriptor = %descriptor, %error, "prepare: session connect failed");
            prepare_error()
        }
    }
}

fn prepare_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Failed to prepare stream" })),
    )
        .into_response()
}

/// Declared content type: remuxed output is always fragmented MP4,
/// passthrough keeps the container's own type.
fn content_type_for(extension: &str) -> String {
    if is_direct_play(extension) {
        mime_guess::from_ext(extension)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    } else {
        "video/mp4".to_string()
    }
}

fn unsatisfiable(status: StatusCode, media: &SelectedMedia) -> Response {
    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_RANGE, format!("bytes */{}", media.length));
    finalize(response, Body::empty())
}

fn finalize(builder: axum::http::response::Builder, body: Body) -> Response {
    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
