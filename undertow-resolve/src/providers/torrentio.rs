//! Torrentio index provider.
//!
//! Queries the Torrentio stream listing for a movie id. The listing is
//! not quality-keyed, so streams whose title mentions `1080p` are
//! preferred over the rest, keeping the listing's own order otherwise.

use async_trait::async_trait;
use serde::Deserialize;
use undertow_core::SwarmDescriptor;

use super::TorrentIndex;
use crate::errors::ResolveError;
use crate::types::StreamKey;

const SOURCE_NAME: &str = "torrentio";

/// Torrentio index backend.
#[derive(Debug)]
pub struct TorrentioIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TorrentioResponse {
    #[serde(default)]
    streams: Vec<TorrentioStream>,
}

#[derive(Debug, Deserialize)]
struct TorrentioStream {
    #[serde(default)]
    title: String,
    #[serde(rename = "infoHash")]
    info_hash: Option<String>,
}

impl TorrentioIndex {
    /// Creates a provider against the public Torrentio endpoint.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, "https://torrentio.strem.fun".to_string())
    }

    /// Creates a provider against a custom base URL, for tests and mirrors.
    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Picks the best stream from a listing: first 1080p title with a
    /// hash, else the first stream with a hash.
    fn parse_body(body: &str, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError> {
        let response: TorrentioResponse =
            serde_json::from_str(body).map_err(|e| ResolveError::Malformed {
                source_name: SOURCE_NAME.to_string(),
                reason: format!("JSON decoding failed: {e}"),
            })?;

        let with_hash =
            |stream: &&TorrentioStream| stream.info_hash.as_deref().is_some_and(|h| !h.is_empty());

        let Some(stream) = response
            .streams
            .iter()
            .filter(with_hash)
            .find(|stream| stream.title.contains("1080p"))
            .or_else(|| response.streams.iter().find(with_hash))
        else {
            return Ok(None);
        };

        let hash = stream.info_hash.as_deref().unwrap_or_default();
        SwarmDescriptor::from_info_hash(hash, &key.title)
            .map(Some)
            .map_err(|e| ResolveError::Descriptor {
                source_name: SOURCE_NAME.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl TorrentIndex for TorrentioIndex {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn lookup(&self, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError> {
        let url = format!("{}/stream/movie/{}.json", self.base_url, key.content_id);

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| ResolveError::Network {
                    source_name: SOURCE_NAME.to_string(),
                    reason: format!("request failed: {e}"),
                })?;

        if !response.status().is_success() {
            return Err(ResolveError::Network {
                source_name: SOURCE_NAME.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| ResolveError::Network {
            source_name: SOURCE_NAME.to_string(),
            reason: format!("body read failed: {e}"),
        })?;

        Self::parse_body(&body, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_SD: &str = "0303030303030303030303030303030303030303";
    const HASH_HD: &str = "0404040404040404040404040404040404040404";

    #[test]
    fn test_prefers_1080p_title() {
        let body = format!(
            r#"{{"streams":[
                {{"title":"Movie 720p WEB","infoHash":"{HASH_SD}"}},
                {{"title":"Movie 1080p BluRay","infoHash":"{HASH_HD}"}}]}}"#
        );
        let key = StreamKey::new("tt0133093", "The Matrix", "720p");
        let descriptor = TorrentioIndex::parse_body(&body, &key).unwrap().unwrap();
        assert!(descriptor.as_magnet().contains(HASH_HD));
    }

    #[test]
    fn test_falls_back_to_first_stream_with_hash() {
        let body = format!(
            r#"{{"streams":[
                {{"title":"Movie 480p external","url":"https://example.com/x"}},
                {{"title":"Movie 720p WEB","infoHash":"{HASH_SD}"}}]}}"#
        );
        let key = StreamKey::new("tt0133093", "The Matrix", "720p");
        let descriptor = TorrentioIndex::parse_body(&body, &key).unwrap().unwrap();
        assert!(descriptor.as_magnet().contains(HASH_SD));
    }

    #[test]
    fn test_empty_listing_is_no_result() {
        let key = StreamKey::new("tt0133093", "The Matrix", "720p");
        assert!(
            TorrentioIndex::parse_body(r#"{"streams":[]}"#, &key)
                .unwrap()
                .is_none()
        );
    }
}
