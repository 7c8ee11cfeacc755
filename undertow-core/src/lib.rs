//! Undertow Core - Swarm session management and streaming delivery
//!
//! This crate provides the stateful heart of the streaming proxy: the swarm
//! session abstraction, the TTL-evicted session cache, playable-file
//! selection, the transcode pipeline, and subtitle conversion.

pub mod config;
pub mod streaming;
pub mod swarm;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::UndertowConfig;
pub use streaming::{StreamError, SubtitleFormat};
pub use swarm::{MediaEntry, SwarmCache, SwarmConnector, SwarmDescriptor, SwarmError, SwarmSession};

/// Core errors that can bubble up from any Undertow subsystem.
#[derive(Debug, thiserror::Error)]
pub enum UndertowError {
    #[error("Swarm error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UndertowError>;
