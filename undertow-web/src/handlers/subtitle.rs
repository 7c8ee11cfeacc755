//! Subtitle delivery: streaming WebVTT, converted from SubRip when
//! that is what the swarm carries.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};
use undertow_core::streaming::{find_subtitle, open_subtitle};
use undertow_resolve::StreamKey;

use crate::server::AppState;

/// Quality labels tried when looking for an already-resolvable
/// descriptor; subtitle requests carry no quality of their own.
const QUALITY_FALLBACK: [&str; 3] = ["720p", "1080p", "480p"];

/// Query parameters identifying the stream whose subtitles are wanted.
#[derive(Debug, Deserialize)]
pub struct SubtitleQuery {
    pub id: String,
    pub title: String,
}

/// `GET /stream/subtitle` - `text/vtt` body or 404.
///
/// Any failure along the way (no resolvable descriptor, unreachable
/// swarm, no subtitle file) is a plain 404 with no partial body.
pub async fn stream_subtitle(
    State(state): State<AppState>,
    Query(query): Query<SubtitleQuery>,
) -> Response {
    let mut descriptor = None;
    for quality in QUALITY_FALLBACK {
        let key = StreamKey::new(&query.id, &query.title, quality);
        match state.resolver.resolve(&key).await {
            Ok(found) => {
                descriptor = Some(found);
                break;
            }
            Err(error) => debug!(key = %key, %error, "subtitle resolution miss"),
        }
    }
    let Some(descriptor) = descriptor else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let session = match state.swarms.get_or_create(&descriptor).await {
        Ok(session) => session,
        Err(error) => {
            warn!(descriptor = %descriptor, %error, "subtitle: session unavailable");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let Some((entry_index, format)) = find_subtitle(session.entries()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    info!(descriptor = %descriptor, format = ?format, "serving subtitle");
    let stream = open_subtitle(
        session,
        entry_index,
        format,
        state.config.swarm.read_chunk_size,
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/vtt; charset=utf-8")
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
