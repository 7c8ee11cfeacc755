//! Streaming delivery pipeline
//!
//! Produces bounded byte streams from a swarm session: direct passthrough
//! for natively playable containers, an ffmpeg remux stage for everything
//! else, and streaming subtitle conversion.

pub mod subtitle;
pub mod transform;

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

pub use subtitle::{SrtToVtt, SubtitleFormat, find_subtitle, open_subtitle};
pub use transform::{DIRECT_PLAY_EXTENSIONS, MediaPipeline, is_direct_play};

use crate::swarm::SwarmError;

/// Errors raised while producing a response body.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Swarm transfer error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("Transcode failed: {reason}")]
    Transcode { reason: String },

    #[error("I/O error during streaming: {0}")]
    Io(#[from] std::io::Error),
}

/// Channel-backed byte stream handed to the HTTP layer as a response body.
///
/// Producer tasks run with bounded buffering; dropping the stream (client
/// disconnect) closes the channel and unwinds the producers promptly.
pub struct ByteStream {
    receiver: mpsc::Receiver<Result<Bytes, StreamError>>,
}

impl ByteStream {
    /// Creates a stream together with its bounded producer side.
    pub fn channel(depth: usize) -> (mpsc::Sender<Result<Bytes, StreamError>>, Self) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        (sender, Self { receiver })
    }

    /// Collects the remaining stream into one buffer. Test helper.
    pub async fn collect(mut self) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.receiver.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl futures::Stream for ByteStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_byte_stream_yields_in_order_and_ends() {
        let (tx, mut stream) = ByteStream::channel(4);
        tx.send(Ok(Bytes::from_static(b"one"))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"two"))).await.unwrap();
        drop(tx);

        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"one");
        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"two");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_byte_stream_surfaces_producer_error() {
        let (tx, stream) = ByteStream::channel(1);
        tx.send(Err(StreamError::Transcode {
            reason: "boom".to_string(),
        }))
        .await
        .unwrap();
        drop(tx);

        assert!(stream.collect().await.is_err());
    }
}
