//! Passthrough and remux stages for media delivery
//!
//! Natively playable containers are forwarded unchanged; everything else is
//! piped through an ffmpeg child process producing a fragmented MP4 that
//! browsers can play progressively. Neither path buffers the asset: chunks
//! flow through a bounded channel and stop when the client goes away.

use std::ops::Range;
use std::process::Stdio;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ByteStream, StreamError};
use crate::swarm::SwarmSession;

/// Containers delivered without remuxing.
pub const DIRECT_PLAY_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mkv"];

/// How many chunks may sit between producer and the HTTP writer.
const CHANNEL_DEPTH: usize = 8;

/// Maximum ffmpeg stderr captured for error reporting.
const STDERR_TAIL: u64 = 8192;

pub fn is_direct_play(extension: &str) -> bool {
    DIRECT_PLAY_EXTENSIONS.contains(&extension)
}

/// Builds response byte streams from a swarm session.
#[derive(Debug, Clone)]
pub struct MediaPipeline {
    read_chunk_size: usize,
    ffmpeg_program: String,
}

impl MediaPipeline {
    pub fn new(read_chunk_size: usize) -> Self {
        Self {
            read_chunk_size: read_chunk_size.max(4096),
            ffmpeg_program: "ffmpeg".to_string(),
        }
    }

    /// Overrides the ffmpeg binary invoked for remuxing.
    pub fn with_ffmpeg(mut self, program: impl Into<String>) -> Self {
        self.ffmpeg_program = program.into();
        self
    }

    /// Opens a byte stream for `range` of one entry, remuxing when the
    /// container is not directly playable.
    ///
    /// Transcode failures terminate only this stream; the session stays
    /// live for the next request.
    pub fn open(
        &self,
        session: Arc<dyn SwarmSession>,
        entry_index: usize,
        range: Range<u64>,
        extension: &str,
    ) -> ByteStream {
        let (tx, stream) = ByteStream::channel(CHANNEL_DEPTH);
        let chunk_size = self.read_chunk_size;

        if is_direct_play(extension) {
            tokio::spawn(async move {
                feed_range(session, entry_index, range, chunk_size, &tx).await;
            });
        } else {
            let program = self.ffmpeg_program.clone();
            let extension = extension.to_string();
            tokio::spawn(async move {
                debug!("Remuxing .{} stream through {}", extension, program);
                if let Err(error) =
                    run_remux(program, session, entry_index, range, chunk_size, &tx).await
                {
                    warn!("Remux stage failed: {}", error);
                    let _ = tx.send(Err(error)).await;
                }
            });
        }

        stream
    }
}

/// Copies `range` of an entry into the channel in bounded chunks.
///
/// Stops early when the client disconnects (channel closed) or the session
/// stops producing bytes.
pub(crate) async fn feed_range(
    session: Arc<dyn SwarmSession>,
    entry_index: usize,
    range: Range<u64>,
    chunk_size: usize,
    tx: &mpsc::Sender<Result<bytes::Bytes, StreamError>>,
) {
    let mut position = range.start;
    while position < range.end {
        let window_end = (position + chunk_size as u64).min(range.end);
        match session.read_range(entry_index, position..window_end).await {
            Ok(chunk) if chunk.is_empty() => break,
            Ok(chunk) => {
                position += chunk.len() as u64;
                if tx.send(Ok(chunk)).await.is_err() {
                    debug!("Client disconnected at offset {}", position);
                    break;
                }
            }
            Err(error) => {
                warn!("Swarm read failed at offset {}: {}", position, error);
                let _ = tx.send(Err(error.into())).await;
                break;
            }
        }
    }
}

/// Pipes the source range through ffmpeg into a fragmented, progressively
/// playable MP4.
async fn run_remux(
    program: String,
    session: Arc<dyn SwarmSession>,
    entry_index: usize,
    range: Range<u64>,
    chunk_size: usize,
    tx: &mpsc::Sender<Result<bytes::Bytes, StreamError>>,
) -> Result<(), StreamError> {
    let mut child = spawn_ffmpeg(&program)?;

    let mut stdin = child.stdin.take().ok_or_else(|| StreamError::Transcode {
        reason: "ffmpeg stdin unavailable".to_string(),
    })?;
    let mut stdout = child.stdout.take().ok_or_else(|| StreamError::Transcode {
        reason: "ffmpeg stdout unavailable".to_string(),
    })?;
    let stderr = child.stderr.take();

    // Source feeder: swarm -> ffmpeg stdin. A write error means ffmpeg went
    // away; dropping stdin at the end signals EOF.
    let feeder = tokio::spawn(async move {
        let mut position = range.start;
        while position < range.end {
            let window_end = (position + chunk_size as u64).min(range.end);
            match session.read_range(entry_index, position..window_end).await {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => {
                    position += chunk.len() as u64;
                    if stdin.write_all(&chunk).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    debug!("Swarm read ended remux input: {}", error);
                    break;
                }
            }
        }
    });

    // Keep a bounded stderr tail for diagnostics
    let stderr_tail = tokio::spawn(async move {
        let mut tail = Vec::new();
        if let Some(stderr) = stderr {
            let _ = stderr.take(STDERR_TAIL).read_to_end(&mut tail).await;
        }
        String::from_utf8_lossy(&tail).trim().to_string()
    });

    // Remuxed output: ffmpeg stdout -> response channel
    let mut buffer = BytesMut::with_capacity(chunk_size);
    loop {
        buffer.reserve(chunk_size);
        let read = stdout.read_buf(&mut buffer).await?;
        if read == 0 {
            break;
        }
        if tx.send(Ok(buffer.split().freeze())).await.is_err() {
            debug!("Client disconnected during remux");
            feeder.abort();
            // Dropping the child kills ffmpeg (kill_on_drop)
            return Ok(());
        }
    }

    let status = child.wait().await?;
    feeder.abort();
    if !status.success() {
        let tail = stderr_tail.await.unwrap_or_default();
        return Err(StreamError::Transcode {
            reason: format!("ffmpeg exited with {status}: {tail}"),
        });
    }

    Ok(())
}

fn spawn_ffmpeg(program: &str) -> Result<Child, StreamError> {
    Command::new(program)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-c:v",
            "libx264",
            "-b:v",
            "1024k",
            "-preset",
            "veryfast",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-movflags",
            "frag_keyframe+empty_moov",
            "-f",
            "mp4",
            "pipe:1",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StreamError::Transcode {
            reason: format!("failed to spawn {program}: {e}"),
        })
}
