//! Error types for descriptor resolution.

use thiserror::Error;

/// Errors that can occur while resolving a stream request to a swarm
/// descriptor.
///
/// Per-source failures (`Network`, `Malformed`, `Timeout`) are normally
/// absorbed by the chain and logged; they surface only from direct
/// provider calls. `NotFound` is the terminal failure after every
/// source has been tried.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Every configured index was tried and none produced a descriptor.
    #[error("No torrent source produced a result for '{content_id}'")]
    NotFound {
        /// Content identifier that could not be resolved
        content_id: String,
    },

    /// Network communication with an index failed.
    #[error("Network error from {source_name}: {reason}")]
    Network {
        /// Index that failed
        source_name: String,
        /// The reason for the network error
        reason: String,
    },

    /// An index returned a body the provider could not interpret.
    #[error("Malformed response from {source_name}: {reason}")]
    Malformed {
        /// Index that returned the body
        source_name: String,
        /// The reason parsing failed
        reason: String,
    },

    /// A single index lookup exceeded the per-source deadline.
    #[error("Source {source_name} timed out after {seconds}s")]
    Timeout {
        /// Index that timed out
        source_name: String,
        /// Deadline that was exceeded
        seconds: u64,
    },

    /// An index returned hash material that does not form a valid
    /// descriptor.
    #[error("Invalid descriptor from {source_name}: {reason}")]
    Descriptor {
        /// Index that produced the material
        source_name: String,
        /// Why the descriptor is invalid
        reason: String,
    },

    /// The shared HTTP client could not be constructed.
    #[error("HTTP client setup failed: {reason}")]
    ClientSetup {
        /// The reason client construction failed
        reason: String,
    },
}
