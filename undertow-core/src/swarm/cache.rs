//! Session cache with connect de-duplication and TTL eviction
//!
//! The cache is the sole owner of every live [`SwarmSession`] in the
//! process. All map mutation happens under one async mutex, so a foreground
//! lookup can never observe a session the eviction sweep is tearing down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::selector::{SelectedMedia, select_playable};
use super::{SwarmConnector, SwarmDescriptor, SwarmError, SwarmSession};
use crate::config::CacheConfig;

type ConnectOutcome = Result<Arc<dyn SwarmSession>, SwarmError>;

/// One cache slot per descriptor.
enum Slot {
    /// A connect attempt is in flight; followers park a waiter here.
    Connecting(Vec<oneshot::Sender<ConnectOutcome>>),
    Ready(ReadySlot),
}

struct ReadySlot {
    session: Arc<dyn SwarmSession>,
    /// Selection result, computed once per session. `Some(None)` means the
    /// swarm was scanned and holds no playable file.
    selected: Option<Option<SelectedMedia>>,
}

struct CacheState {
    slots: HashMap<SwarmDescriptor, Slot>,
    last_access: HashMap<SwarmDescriptor, Instant>,
    closed: bool,
}

/// Cache of live swarm sessions, keyed by descriptor.
///
/// Guarantees at most one session (and at most one in-flight connect
/// attempt) per descriptor, tracks last access, and evicts idle sessions
/// from a recurring sweep.
pub struct SwarmCache {
    connector: Arc<dyn SwarmConnector>,
    state: Mutex<CacheState>,
    connect_timeout: Duration,
    config: CacheConfig,
}

impl SwarmCache {
    pub fn new(
        connector: Arc<dyn SwarmConnector>,
        config: CacheConfig,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            state: Mutex::new(CacheState {
                slots: HashMap::new(),
                last_access: HashMap::new(),
                closed: false,
            }),
            connect_timeout,
            config,
        }
    }

    /// Returns the live session for `descriptor`, connecting if necessary.
    ///
    /// Concurrent callers for a descriptor with no session share a single
    /// connect attempt: the first caller performs the handshake, followers
    /// await its outcome. A failed attempt leaves no entry behind, so the
    /// next call retries cleanly.
    ///
    /// # Errors
    /// - `SwarmError::ConnectFailed` / `ConnectTimeout` - handshake failure
    /// - `SwarmError::CacheClosed` - cache already shut down
    pub async fn get_or_create(
        &self,
        descriptor: &SwarmDescriptor,
    ) -> Result<Arc<dyn SwarmSession>, SwarmError> {
        let waiter = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(SwarmError::CacheClosed);
            }

            match state.slots.get_mut(descriptor) {
                Some(Slot::Ready(slot)) => {
                    let session = slot.session.clone();
                    state
                        .last_access
                        .insert(descriptor.clone(), Instant::now());
                    return Ok(session);
                }
                Some(Slot::Connecting(waiters)) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    state
                        .slots
                        .insert(descriptor.clone(), Slot::Connecting(Vec::new()));
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or_else(|_| {
                Err(SwarmError::ConnectFailed {
                    descriptor: descriptor.to_string(),
                    reason: "connect attempt dropped".to_string(),
                })
            });
        }

        // This caller won the connect attempt.
        let outcome = self.connect_once(descriptor).await;
        self.finish_connect(descriptor, outcome).await
    }

    async fn connect_once(&self, descriptor: &SwarmDescriptor) -> ConnectOutcome {
        debug!("Connecting to {}", descriptor);
        match tokio::time::timeout(self.connect_timeout, self.connector.connect(descriptor)).await
        {
            Ok(result) => result,
            Err(_) => Err(SwarmError::ConnectTimeout {
                descriptor: descriptor.to_string(),
                seconds: self.connect_timeout.as_secs(),
            }),
        }
    }

    /// Publishes a connect outcome: installs the session (or removes the
    /// slot on failure) and wakes every parked waiter with the same result.
    async fn finish_connect(
        &self,
        descriptor: &SwarmDescriptor,
        outcome: ConnectOutcome,
    ) -> ConnectOutcome {
        let mut late_teardown = None;

        let (waiters, outcome) = {
            let mut state = self.state.lock().await;
            let waiters = match state.slots.remove(descriptor) {
                Some(Slot::Connecting(waiters)) => waiters,
                _ => Vec::new(),
            };

            let outcome = match outcome {
                Ok(session) if state.closed => {
                    // Shutdown raced the handshake; don't cache the session.
                    late_teardown = Some(session);
                    Err(SwarmError::CacheClosed)
                }
                Ok(session) => {
                    state.slots.insert(
                        descriptor.clone(),
                        Slot::Ready(ReadySlot {
                            session: session.clone(),
                            selected: None,
                        }),
                    );
                    state
                        .last_access
                        .insert(descriptor.clone(), Instant::now());
                    info!("Session ready for {}", descriptor);
                    Ok(session)
                }
                Err(error) => {
                    state.last_access.remove(descriptor);
                    warn!("Connect failed for {}: {}", descriptor, error);
                    Err(error)
                }
            };

            (waiters, outcome)
        };

        if let Some(session) = late_teardown {
            session.shutdown().await;
        }

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        outcome
    }

    /// Returns the session for `descriptor` together with its cached media
    /// selection, connecting and scanning the file set on first use. The
    /// selection always describes the returned session, so a caller can
    /// stream from it without a second cache lookup. `Ok((_, None))` means
    /// the swarm holds no playable file; the session stays alive since it
    /// may still carry subtitles.
    ///
    /// # Errors
    /// Same failure modes as [`SwarmCache::get_or_create`].
    pub async fn select_media(
        &self,
        descriptor: &SwarmDescriptor,
    ) -> Result<(Arc<dyn SwarmSession>, Option<SelectedMedia>), SwarmError> {
        let session = self.get_or_create(descriptor).await?;

        let mut state = self.state.lock().await;
        let Some(Slot::Ready(slot)) = state.slots.get_mut(descriptor) else {
            // Evicted between the lookup and this lock; selection is still
            // valid for the session the caller already holds.
            let selected = select_playable(session.entries());
            return Ok((session, selected));
        };

        if let Some(cached) = &slot.selected {
            let selected = cached.clone();
            return Ok((session, selected));
        }

        let selected = select_playable(session.entries());
        if let Some(media) = &selected {
            session.prioritize(media.entry_index);
            debug!(
                "Selected '{}' ({} bytes) for {}",
                media.name, media.length, descriptor
            );
        }
        slot.selected = Some(selected.clone());
        Ok((session, selected))
    }

    /// Refreshes the last-access time for a descriptor with a live session.
    pub async fn touch(&self, descriptor: &SwarmDescriptor) {
        let mut state = self.state.lock().await;
        if state.slots.contains_key(descriptor) {
            state
                .last_access
                .insert(descriptor.clone(), Instant::now());
        }
    }

    /// Tears down every session idle longer than the configured TTL.
    ///
    /// Returns the number of sessions evicted. In-flight connects are never
    /// evicted; their access time starts when the session becomes ready.
    pub async fn evict_idle(&self) -> usize {
        let ttl = self.config.session_ttl;
        let now = Instant::now();
        let mut victims = Vec::new();

        {
            let mut state = self.state.lock().await;
            let idle: Vec<SwarmDescriptor> = state
                .last_access
                .iter()
                .filter(|(descriptor, last)| {
                    now.duration_since(**last) >= ttl
                        && matches!(state.slots.get(*descriptor), Some(Slot::Ready(_)))
                })
                .map(|(descriptor, _)| descriptor.clone())
                .collect();

            for descriptor in idle {
                if let Some(Slot::Ready(slot)) = state.slots.remove(&descriptor) {
                    state.last_access.remove(&descriptor);
                    victims.push((descriptor, slot.session));
                }
            }
        }

        let count = victims.len();
        for (descriptor, session) in victims {
            info!("Evicting idle session {}", descriptor);
            session.shutdown().await;
        }
        count
    }

    /// Spawns the recurring eviction sweep.
    ///
    /// Abort the returned handle (or call [`SwarmCache::shutdown`]) to stop
    /// sweeping.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let interval = cache.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let evicted = cache.evict_idle().await;
                if evicted > 0 {
                    debug!("Eviction sweep removed {} session(s)", evicted);
                }
            }
        })
    }

    /// Tears down all sessions regardless of TTL and rejects future lookups.
    pub async fn shutdown(&self) {
        let sessions: Vec<(SwarmDescriptor, Arc<dyn SwarmSession>)> = {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.last_access.clear();
            state
                .slots
                .drain()
                .filter_map(|(descriptor, slot)| match slot {
                    Slot::Ready(slot) => Some((descriptor, slot.session)),
                    // Waiters are dropped; they observe "connect attempt
                    // dropped" and the winner sees `closed` on publish.
                    Slot::Connecting(_) => None,
                })
                .collect()
        };

        for (descriptor, session) in sessions {
            info!("Shutting down session {}", descriptor);
            session.shutdown().await;
        }
    }

    /// Number of live (ready) sessions, for health reporting.
    pub async fn active_sessions(&self) -> usize {
        let state = self.state.lock().await;
        state
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }
}
