//! In-memory swarm backend for development and tests
//!
//! Serves a fixed file set for any descriptor, with optional simulated
//! handshake latency and failures. Stands in for the production peer
//! protocol behind the [`SwarmConnector`] seam.

use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{MediaEntry, SwarmConnector, SwarmDescriptor, SwarmError, SwarmSession};

/// Connector that attaches every descriptor to the same in-memory file set.
pub struct MemorySwarmConnector {
    files: Vec<(MediaEntry, Bytes)>,
    connect_delay: Mutex<Duration>,
    fail_budget: AtomicUsize,
    connect_attempts: AtomicUsize,
    sessions: Mutex<Vec<Arc<MemorySwarmSession>>>,
}

impl MemorySwarmConnector {
    pub fn new(files: Vec<(MediaEntry, Bytes)>) -> Self {
        Self {
            files,
            connect_delay: Mutex::new(Duration::ZERO),
            fail_budget: AtomicUsize::new(0),
            connect_attempts: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Loads every regular file in `dir` (non-recursive) as the served
    /// file set. Intended for small development fixtures; contents are held
    /// in memory.
    ///
    /// # Errors
    /// Propagates directory or file read failures.
    pub fn from_directory(dir: &Path) -> std::io::Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let data = std::fs::read(entry.path())?;
            files.push((MediaEntry::new(name, data.len() as u64), Bytes::from(data)));
        }
        Ok(Self::new(files))
    }

    /// Simulated handshake latency applied to every connect.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = delay;
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.fail_budget.store(count, Ordering::SeqCst);
    }

    /// Total connect attempts observed, including failed ones.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of sessions handed out that have since been torn down.
    pub fn shutdown_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|session| session.is_shutdown())
            .count()
    }
}

#[async_trait]
impl SwarmConnector for MemorySwarmConnector {
    async fn connect(
        &self,
        descriptor: &SwarmDescriptor,
    ) -> Result<Arc<dyn SwarmSession>, SwarmError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.connect_delay.lock().unwrap();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        if self
            .fail_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| {
                budget.checked_sub(1)
            })
            .is_ok()
        {
            return Err(SwarmError::ConnectFailed {
                descriptor: descriptor.to_string(),
                reason: "simulated swarm unreachable".to_string(),
            });
        }

        let session = Arc::new(MemorySwarmSession::new(self.files.clone()));
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

/// In-memory swarm session backing [`MemorySwarmConnector`].
pub struct MemorySwarmSession {
    entries: Vec<MediaEntry>,
    data: Vec<Bytes>,
    prioritized: Mutex<Option<usize>>,
    shutdown: AtomicBool,
}

impl MemorySwarmSession {
    pub fn new(files: Vec<(MediaEntry, Bytes)>) -> Self {
        let (entries, data) = files.into_iter().unzip();
        Self {
            entries,
            data,
            prioritized: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn prioritized_entry(&self) -> Option<usize> {
        *self.prioritized.lock().unwrap()
    }
}

#[async_trait]
impl SwarmSession for MemorySwarmSession {
    fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    async fn read_range(&self, entry_index: usize, range: Range<u64>) -> Result<Bytes, SwarmError> {
        let entry = self
            .entries
            .get(entry_index)
            .ok_or(SwarmError::UnknownEntry { index: entry_index })?;

        if self.is_shutdown() {
            return Err(SwarmError::ReadFailed {
                entry: entry.name.clone(),
                reason: "session torn down".to_string(),
            });
        }

        let data = &self.data[entry_index];
        let start = (range.start.min(entry.length)) as usize;
        let end = (range.end.min(entry.length)) as usize;
        if start >= end {
            return Ok(Bytes::new());
        }
        Ok(data.slice(start..end))
    }

    fn prioritize(&self, entry_index: usize) {
        *self.prioritized.lock().unwrap() = Some(entry_index);
    }

    async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
