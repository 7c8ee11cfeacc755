//! Index provider implementations for descriptor resolution.

use async_trait::async_trait;
use undertow_core::SwarmDescriptor;

use crate::errors::ResolveError;
use crate::types::StreamKey;

pub mod apibay;
pub mod torrentio;
pub mod yts;

pub use apibay::ApibayIndex;
pub use torrentio::TorrentioIndex;
pub use yts::YtsIndex;

/// Trait for torrent index backends.
///
/// Implementations wrap one public index API each. A lookup either
/// finds a usable descriptor, finds nothing (`Ok(None)`), or fails;
/// the chain treats the last two the same way and moves on.
#[async_trait]
pub trait TorrentIndex: Send + Sync + std::fmt::Debug {
    /// Stable source name, used in logs and error values.
    fn name(&self) -> &'static str;

    /// Look up a descriptor for the given stream request.
    ///
    /// # Errors
    /// - `ResolveError::Network` - request could not be completed
    /// - `ResolveError::Malformed` - response body could not be interpreted
    /// - `ResolveError::Descriptor` - index returned unusable hash material
    async fn lookup(&self, key: &StreamKey) -> Result<Option<SwarmDescriptor>, ResolveError>;
}
