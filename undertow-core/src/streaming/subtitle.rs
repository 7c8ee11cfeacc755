//! Subtitle lookup and streaming SRT to WebVTT conversion
//!
//! SubRip and WebVTT differ in two ways that matter for browsers: the
//! `WEBVTT` header, and the fractional-second separator in timestamp lines
//! (comma vs period). The converter works incrementally, holding only a few
//! trailing lines across read boundaries so a logical record is never split.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use super::transform::feed_range;
use super::{ByteStream, StreamError};
use crate::swarm::{MediaEntry, SwarmSession};

/// Recognized subtitle container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    /// Web-native cue format, streamed through unchanged
    WebVtt,
    /// Legacy line-numbered format with comma-decimal timestamps
    SubRip,
}

/// Lines retained across chunk boundaries so an unfinished record at the
/// end of a read is not emitted half-converted.
const CARRY_LINES: usize = 3;

/// Finds the first subtitle file in a swarm's file set.
pub fn find_subtitle(entries: &[MediaEntry]) -> Option<(usize, SubtitleFormat)> {
    entries.iter().enumerate().find_map(|(index, entry)| {
        match entry.extension().as_deref() {
            Some("vtt") => Some((index, SubtitleFormat::WebVtt)),
            Some("srt") => Some((index, SubtitleFormat::SubRip)),
            _ => None,
        }
    })
}

/// Incremental SRT to WebVTT converter.
///
/// Feed raw read windows with [`SrtToVtt::push_bytes`], emit the retained
/// tail with [`SrtToVtt::finish`]. Sequence-number and blank lines are
/// dropped, timestamp lines get period decimal separators, caption lines
/// pass through followed by a blank line.
#[derive(Debug, Default)]
pub struct SrtToVtt {
    buffer: String,
    pending: Vec<u8>,
}

impl SrtToVtt {
    /// Fixed header emitted once before any converted output.
    pub const HEADER: &'static str = "WEBVTT\n\n";

    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a raw read window and converts what is safely complete.
    ///
    /// Read boundaries fall anywhere, including inside a multi-byte UTF-8
    /// character; the trailing incomplete bytes are held back until the
    /// rest of the character arrives.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let complete = utf8_complete_len(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..complete]).into_owned();
        self.pending.drain(..complete);
        self.push(&text)
    }

    /// Converts as much of the accumulated input as is safely complete.
    pub fn push(&mut self, chunk: &str) -> String {
        self.buffer.push_str(chunk);

        let mut output = String::new();
        let carry;
        {
            let lines: Vec<&str> = self.buffer.split('\n').collect();
            if lines.len() <= CARRY_LINES {
                return output;
            }
            for line in &lines[..lines.len() - CARRY_LINES] {
                convert_line(line, &mut output);
            }
            carry = lines[lines.len() - CARRY_LINES..].join("\n");
        }
        self.buffer = carry;
        output
    }

    /// Converts and returns whatever is still held back.
    pub fn finish(mut self) -> String {
        if !self.pending.is_empty() {
            // Input ended mid-character; decode the stub lossily
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push_str(&tail);
        }
        let mut output = String::new();
        for line in self.buffer.split('\n') {
            convert_line(line, &mut output);
        }
        output
    }
}

/// Length of the longest prefix that does not end inside a multi-byte
/// UTF-8 sequence.
fn utf8_complete_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(4) {
        let index = bytes.len() - back;
        let byte = bytes[index];
        if byte & 0xC0 == 0x80 {
            // Continuation byte, keep scanning for its lead
            continue;
        }
        let width: usize = if byte & 0x80 == 0x00 {
            1
        } else if byte & 0xE0 == 0xC0 {
            2
        } else if byte & 0xF0 == 0xE0 {
            3
        } else if byte & 0xF8 == 0xF0 {
            4
        } else {
            // Invalid lead byte; leave it to the lossy decode
            1
        };
        return if back < width { index } else { bytes.len() };
    }
    bytes.len()
}

fn convert_line(line: &str, output: &mut String) {
    let trimmed = line.trim();

    // Blank lines and bare sequence numbers carry no cue content
    if trimmed.is_empty() || trimmed.chars().all(|c| c.is_ascii_digit()) {
        return;
    }

    if trimmed.contains("-->") {
        // SubRip uses comma decimal separators in timestamps
        output.push_str(&trimmed.replace(',', "."));
        output.push('\n');
    } else {
        output.push_str(trimmed);
        output.push_str("\n\n");
    }
}

/// Opens a `text/vtt` byte stream for one subtitle entry.
///
/// WebVTT input is forwarded byte-identical; SubRip input is converted on
/// the fly without holding the file in memory.
pub fn open_subtitle(
    session: Arc<dyn SwarmSession>,
    entry_index: usize,
    format: SubtitleFormat,
    chunk_size: usize,
) -> ByteStream {
    let (tx, stream) = ByteStream::channel(8);
    let chunk_size = chunk_size.max(4096);

    tokio::spawn(async move {
        let Some(length) = session.entries().get(entry_index).map(|e| e.length) else {
            let _ = tx
                .send(Err(StreamError::Swarm(
                    crate::swarm::SwarmError::UnknownEntry { index: entry_index },
                )))
                .await;
            return;
        };

        match format {
            SubtitleFormat::WebVtt => {
                feed_range(session, entry_index, 0..length, chunk_size, &tx).await;
            }
            SubtitleFormat::SubRip => {
                if tx.send(Ok(Bytes::from_static(SrtToVtt::HEADER.as_bytes())))
                    .await
                    .is_err()
                {
                    return;
                }

                let mut converter = SrtToVtt::new();
                let mut position = 0u64;
                while position < length {
                    let window_end = (position + chunk_size as u64).min(length);
                    match session.read_range(entry_index, position..window_end).await {
                        Ok(chunk) if chunk.is_empty() => break,
                        Ok(chunk) => {
                            position += chunk.len() as u64;
                            let converted = converter.push_bytes(&chunk);
                            if !converted.is_empty()
                                && tx.send(Ok(Bytes::from(converted))).await.is_err()
                            {
                                return;
                            }
                        }
                        Err(error) => {
                            warn!("Subtitle read failed at offset {}: {}", position, error);
                            let _ = tx.send(Err(error.into())).await;
                            return;
                        }
                    }
                }

                let tail = converter.finish();
                if !tail.is_empty() {
                    let _ = tx.send(Ok(Bytes::from(tail))).await;
                }
            }
        }
    });

    stream
}
