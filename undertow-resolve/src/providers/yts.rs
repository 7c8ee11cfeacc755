//! YTS index provider.
//!
//! Queries the YTS movie list API by content id and picks the torrent
//! whose advertised quality matches the request, falling back to the
//! first torrent the listing offers.

use async_trait::async_trait;
use serde::Deserialize;
use undertow_core::SwarmDescriptor;

use super::TorrentIndex;
use crate::errors::ResolveError;
use crate::types::StreamKey;

const SOURCE_NAME: &str = "yts";

/// YTS index backend.
#[derive(Debug)]
pub struct YtsIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct YtsResponse {
    data: Option<YtsData>,
}

#[derive(Debug, Deserialize)]
struct YtsData {
    movies: Option<Vec<YtsMovie>>,
}

#[derive(Debug, Deserialize)]
struct YtsMovie {
    #[serde(default)]
    torrents: Vec<YtsTorrent>,
}

#[derive(Debug, Deserialize)]
struct YtsTorrent {
    hash: String,
    quality: String,
}

impl YtsIndex {
    /// Creates a provider against the public YTS API.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, "https://yts.mx".to_string())
    }

    /// Creates a provider against a custom base URL, for tests and mirrors.
    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Interprets a YTS list response, preferring an exact quality match.
    fn parse_body(body: &str, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError> {
        let response: YtsResponse =
            serde_json::from_str(body).map_err(|e| ResolveError::Malformed {
                source_name: SOURCE_NAME.to_string(),
                reason: format!("JSON decoding failed: {e}"),
            })?;

        let Some(movie) = response
            .data
            .and_then(|data| data.movies)
            .and_then(|movies| movies.into_iter().next())
        else {
            return Ok(None);
        };

        let Some(torrent) = movie
            .torrents
            .iter()
            .find(|torrent| torrent.quality == key.quality)
            .or_else(|| movie.torrents.first())
        else {
            return Ok(None);
        };

        SwarmDescriptor::from_info_hash(&torrent.hash, &key.title)
            .map(Some)
            .map_err(|e| ResolveError::Descriptor {
                source_name: SOURCE_NAME.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl TorrentIndex for YtsIndex {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn lookup(&self, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError> {
        let url = format!("{}/api/v2/list_movies.json", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("query_term", key.content_id.as_str())])
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
