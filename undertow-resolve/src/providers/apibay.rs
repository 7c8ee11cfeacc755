//! Apibay index provider.
//!
//! Queries the apibay `q.php` endpoint. The API answers with a flat
//! array of torrents whose numeric fields arrive as strings, and
//! signals "no results" with a single placeholder row carrying an
//! all-zero info hash. The best-seeded real entry wins.

use async_trait::async_trait;
use serde::Deserialize;
use undertow_core::SwarmDescriptor;

use super::TorrentIndex;
use crate::errors::ResolveError;
use crate::types::StreamKey;

const SOURCE_NAME: &str = "apibay";
const PLACEHOLDER_HASH: &str = "0000000000000000000000000000000000000000";

/// Apibay index backend.
#[derive(Debug)]
pub struct ApibayIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApibayTorrent {
    info_hash: String,
    #[serde(default)]
    seeders: String,
}

impl ApibayTorrent {
    fn seeder_count(&self) -> u64 {
        self.seeders.parse().unwrap_or(0)
    }

    fn is_placeholder(&self) -> bool {
        self.info_hash.is_empty() || self.info_hash == PLACEHOLDER_HASH
    }
}

impl ApibayIndex {
    /// Creates a provider against the public apibay endpoint.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, "https://apibay.org".to_string())
    }

    /// Creates a provider against a custom base URL, for tests and mirrors.
    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Picks the best-seeded real torrent from an apibay answer.
    fn parse_body(body: &str, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError> {
        let torrents: Vec<ApibayTorrent> =
            serde_json::from_str(body).map_err(|e| ResolveError::Malformed {
                source_name: SOURCE_NAME.to_string(),
                reason: format!("JSON decoding failed: {e}"),
            })?;

        let Some(best) = torrents
            .iter()
            .filter(|torrent| !torrent.is_placeholder())
            .max_by_key(|torrent| torrent.seeder_count())
        else {
            return Ok(None);
        };

        SwarmDescriptor::from_info_hash(&best.info_hash, &key.title)
            .map(Some)
            .map_err(|e| ResolveError::Descriptor {
                source_name: SOURCE_NAME.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl TorrentIndex for ApibayIndex {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn lookup(&self, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError> {
        let url = format!("{}/q.php", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", key.content_id.as_str())])
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
