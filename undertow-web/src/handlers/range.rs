//! HTTP Range interpretation for media delivery.
//!
//! Implements the subset of RFC 7233 the player population actually
//! sends: single `bytes=start-[end]` ranges. Open-ended ranges are
//! answered with a bounded chunk sized per client class instead of
//! "until EOF", keeping memory and latency bounded on large files.

use axum::http::StatusCode;
use undertow_core::config::HttpConfig;

/// One satisfiable byte window of a media file.
///
/// Computed per request and never stored; `end` is inclusive, as in
/// the `Content-Range` header it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeWindow {
    /// First byte offset served
    pub start: u64,
    /// Last byte offset served, inclusive
    pub end: u64,
    /// Full length of the underlying file
    pub total: u64,
}

impl RangeWindow {
    /// Exact number of bytes this window delivers.
    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this window.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }

    /// Half-open byte range for the session read path.
    pub fn byte_range(&self) -> std::ops::Range<u64> {
        self.start..self.end + 1
    }
}

/// Whether this user agent belongs to the class that must be served
/// ranged responses (mobile Safari / iOS family).
pub fn is_range_mandatory(user_agent: &str) -> bool {
    let is_ios = user_agent.contains("iPhone")
        || user_agent.contains("iPad")
        || user_agent.contains("iOS");
    let is_safari = user_agent.contains("Safari") && !user_agent.contains("Chrome");
    is_ios || is_safari
}

/// Chunk size for an open-ended range, per client class.
pub fn chunk_size_for(config: &HttpConfig, range_mandatory: bool) -> u64 {
    if range_mandatory {
        config.mandatory_class_chunk
    } else {
        config.default_chunk
    }
}

/// Parses a `Range` header value into `(start, Option<end>)`.
///
/// Only the first range of a multi-range request is honored; suffix
/// ranges and anything else unparseable return `None` and are treated
/// as if no `Range` header was sent.
pub fn parse_range_header(raw: &str) -> Option<(u64, Option<u64>)> {
    let spec = raw.strip_prefix("bytes=")?;
    let first = spec.split(',').next()?.trim();
    let (start_str, end_str) = first.split_once('-')?;

    let start = start_str.trim().parse().ok()?;
    let end = if end_str.trim().is_empty() {
        None
    } else {
        Some(end_str.trim().parse().ok()?)
    };
    Some((start, end))
}

/// Turns a parsed range into a satisfiable window over a file of
/// `total` bytes, clamping the end and bounding open-ended requests to
/// `chunk_size`.
///
/// # Errors
/// - `StatusCode::RANGE_NOT_SATISFIABLE` - start beyond EOF, inverted
///   range, or empty file
pub fn resolve_window(
    start: u64,
    requested_end: Option<u64>,
    total: u64,
    chunk_size: u64,
) -> Result<RangeWindow, StatusCode> {
    if total == 0 || start >= total {
        return Err(StatusCode::RANGE_NOT_SATISFIABLE);
    }

    let end = match requested_end {
        Some(end) => end.min(total - 1),
        None => start.saturating_add(chunk_size - 1).min(total - 1),
    };

    if start > end {
        return Err(StatusCode::RANGE_NOT_SATISFIABLE);
    }

    Ok(RangeWindow { start, end, total })
}
