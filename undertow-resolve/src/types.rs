//! Data types for descriptor resolution.

use serde::{Deserialize, Serialize};

/// Identity of one stream request as seen by the resolver.
///
/// Two requests with the same key are the same stream: the key is the
/// lookup unit for the resolution cache. `quality` is an opaque label
/// (`"720p"`, `"1080p"`, ...) matched verbatim against what the indexes
/// advertise, with source-specific fallbacks when nothing matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    /// External content identifier (IMDb id in practice)
    pub content_id: String,
    /// Display title, carried into the descriptor's `dn` field
    pub title: String,
    /// Requested quality label
    pub quality: String,
}

impl StreamKey {
    /// Creates a key from request parts.
    pub fn new(
        content_id: impl Into<String>,
        title: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            title: title.into(),
            quality: quality.into(),
        }
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.content_id, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_differ_by_quality() {
        let a = StreamKey::new("tt0133093", "The Matrix", "720p");
        let b = StreamKey::new("tt0133093", "The Matrix", "1080p");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_display_is_compact() {
        let key = StreamKey::new("tt0133093", "The Matrix", "720p");
        assert_eq!(key.to_string(), "tt0133093@720p");
    }
}
