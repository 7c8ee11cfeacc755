//! Undertow Resolve - Torrent index resolution chain
//!
//! Turns a stream request (content id, title, quality) into a swarm
//! descriptor by querying an ordered chain of public torrent indexes.
//! Every index is treated as unreliable: lookups are individually
//! timed out and failures skip to the next source. Successful
//! resolutions are cached in a bounded LRU.

pub mod chain;
pub mod errors;
pub mod providers;
pub mod types;

// Re-export main types
pub use chain::ResolverChain;
pub use errors::ResolveError;
pub use providers::TorrentIndex;
pub use types::StreamKey;

/// Convenience type alias for Results with ResolveError.
pub type Result<T> = std::result::Result<T, ResolveError>;
