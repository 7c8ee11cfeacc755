//! Swarm session abstraction and lifecycle management
//!
//! A swarm is a peer-to-peer transfer group identified by a content hash.
//! This module defines the descriptor type used to join one, the session
//! trait exposed by an attached swarm, and the TTL-evicted cache that owns
//! every live session in the process.

pub mod cache;
pub mod descriptor;
pub mod memory;
pub mod selector;

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use cache::SwarmCache;
pub use descriptor::SwarmDescriptor;
pub use memory::{MemorySwarmConnector, MemorySwarmSession};
pub use selector::{PLAYABLE_EXTENSIONS, SelectedMedia, select_playable};

/// Errors from swarm attachment and transfer.
///
/// Cloneable so a single failed connect attempt can be delivered to every
/// caller that was awaiting it.
#[derive(Debug, Clone, Error)]
pub enum SwarmError {
    #[error("Invalid swarm descriptor: {reason}")]
    InvalidDescriptor { reason: String },

    #[error("Connect failed for {descriptor}: {reason}")]
    ConnectFailed { descriptor: String, reason: String },

    #[error("Connect timed out after {seconds}s for {descriptor}")]
    ConnectTimeout { descriptor: String, seconds: u64 },

    #[error("Read failed for entry '{entry}': {reason}")]
    ReadFailed { entry: String, reason: String },

    #[error("No entry at index {index} in swarm file list")]
    UnknownEntry { index: usize },

    #[error("Session cache is shut down")]
    CacheClosed,
}

/// A single file inside a swarm's file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    /// File name as announced by the swarm, possibly with path components
    pub name: String,
    /// Total file length in bytes
    pub length: u64,
}

impl MediaEntry {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }

    /// Lowercased file extension without the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.name.rsplit('/').next().unwrap_or(&self.name);
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// A live, connected swarm session.
///
/// Sessions are created by a [`SwarmConnector`] and owned exclusively by the
/// [`SwarmCache`]; every other component borrows one for at most the
/// duration of a single response.
#[async_trait]
pub trait SwarmSession: Send + Sync {
    /// File set announced by the swarm.
    fn entries(&self) -> &[MediaEntry];

    /// Reads `range` (half-open, clamped to the entry length) from one entry.
    ///
    /// # Errors
    /// - `SwarmError::UnknownEntry` - index outside the file set
    /// - `SwarmError::ReadFailed` - transfer failure or torn-down session
    async fn read_range(&self, entry_index: usize, range: Range<u64>) -> Result<Bytes, SwarmError>;

    /// Marks one entry for prioritized sequential transfer.
    fn prioritize(&self, entry_index: usize);

    /// Closes peer connections and releases transfer resources.
    async fn shutdown(&self);
}

/// Capability to attach to a swarm identified by a descriptor.
///
/// The production peer-protocol backend is wired in at this seam; the crate
/// ships [`MemorySwarmConnector`] for development and tests.
#[async_trait]
pub trait SwarmConnector: Send + Sync {
    /// Attaches to the swarm and resolves once its file set is known.
    ///
    /// # Errors
    /// - `SwarmError::ConnectFailed` - handshake or metadata exchange failed
    async fn connect(
        &self,
        descriptor: &SwarmDescriptor,
    ) -> Result<Arc<dyn SwarmSession>, SwarmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_entry_extension() {
        assert_eq!(
            MediaEntry::new("Movie.2024.1080p.mkv", 1).extension(),
            Some("mkv".to_string())
        );
        assert_eq!(
            MediaEntry::new("dir/sub/Feature.MP4", 1).extension(),
            Some("mp4".to_string())
        );
        assert_eq!(MediaEntry::new("README", 1).extension(), None);
        assert_eq!(MediaEntry::new(".hidden", 1).extension(), None);
    }
}
