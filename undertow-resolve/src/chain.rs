//! Ordered resolution chain over unreliable torrent indexes.
//!
//! Sources are tried strictly in configuration order. A source that
//! errors, times out, or comes back empty is skipped; the first usable
//! descriptor wins and is cached by stream key. Misses are never
//! cached, so a title that appears on an index later is picked up by
//! the next request.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use undertow_core::SwarmDescriptor;
use undertow_core::config::ResolverConfig;

use crate::errors::ResolveError;
use crate::providers::{ApibayIndex, TorrentIndex, TorrentioIndex, YtsIndex};
use crate::types::StreamKey;

/// Resolves stream keys to swarm descriptors through an ordered list
/// of index backends, with an LRU cache over successful resolutions.
pub struct ResolverChain {
    sources: Vec<Box<dyn TorrentIndex>>,
    source_timeout: Duration,
    cache: Mutex<LruCache<StreamKey, SwarmDescriptor>>,
}

impl ResolverChain {
    /// Creates a chain over the given sources, tried in order.
    pub fn new(sources: Vec<Box<dyn TorrentIndex>>, config: &ResolverConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sources,
            source_timeout: config.source_timeout,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Creates a chain over the production sources: YTS, then
    /// Torrentio, then Apibay, sharing one HTTP client.
    ///
    /// # Errors
    /// - `ResolveError::ClientSetup` - HTTP client construction failed
    pub fn with_default_sources(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| ResolveError::ClientSetup {
                reason: e.to_string(),
            })?;

        let sources: Vec<Box<dyn TorrentIndex>> = vec![
            Box::new(YtsIndex::new(client.clone())),
            Box::new(TorrentioIndex::new(client.clone())),
            Box::new(ApibayIndex::new(client)),
        ];
        Ok(Self::new(sources, config))
    }

    /// Resolves a stream key to a swarm descriptor.
    ///
    /// Cached resolutions return without touching any source. On a
    /// miss, each source gets one attempt under the per-source
    /// timeout; source failures are logged and skipped.
    ///
    /// # Errors
    /// - `ResolveError::NotFound` - every source was tried without a result
    pub async fn resolve(&self, key: &StreamKey) -> Result<SwarmDescriptor, ResolveError> {
        if let Some(descriptor) = self.cache.lock().get(key).cloned() {
            debug!(key = %key, "resolved from cache");
            return Ok(descriptor);
        }

        for source in &self.sources {
            match timeout(self.source_timeout, source.lookup(key)).await {
                Ok(Ok(Some(descriptor))) => {
                    info!(
                        key = %key,
                        source = source.name(),
                        descriptor = %descriptor,
                        "resolved"
                    );
                    self.cache.lock().put(key.clone(), descriptor.clone());
                    return Ok(descriptor);
                }
                Ok(Ok(None)) => {
                    debug!(key = %key, source = source.name(), "no result");
                }
                Ok(Err(error)) => {
                    warn!(key = %key, source = source.name(), %error, "index lookup failed");
                }
                Err(_) => {
                    warn!(
                        key = %key,
                        source = source.name(),
                        timeout_secs = self.source_timeout.as_secs_f64(),
                        "index lookup timed out"
                    );
                }
            }
        }

        Err(ResolveError::NotFound {
            content_id: key.content_id.clone(),
        })
    }

    /// Number of resolutions currently cached.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug)]
    enum Behavior {
        Empty,
        Fails,
        Returns(SwarmDescriptor),
        Hangs,
    }

    #[derive(Debug)]
    struct ScriptedIndex {
        label: &'static str,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedIndex {
        fn new(label: &'static str, behavior: Behavior) -> (Box<dyn TorrentIndex>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let index = Self {
                label,
                behavior,
                calls: calls.clone(),
            };
            (Box::new(index), calls)
        }
    }

    #[async_trait]
    impl TorrentIndex for ScriptedIndex {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn lookup(
            &self,
            _key: &StreamKey,
        ) -> Result<Option<SwarmDescriptor>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Empty => Ok(None),
                Behavior::Fails => Err(ResolveError::Network {
                    source_name: self.label.to_string(),
                    reason: "connection refused".to_string(),
                }),
                Behavior::Returns(descriptor) => Ok(Some(descriptor.clone())),
                Behavior::Hangs => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(None)
                }
            }
        }
    }

    fn test_config() -> ResolverConfig {
        ResolverConfig {
            source_timeout: Duration::from_millis(50),
            cache_capacity: 8,
            user_agent: "undertow-test",
        }
    }

    fn test_descriptor() -> SwarmDescriptor {
        SwarmDescriptor::from_info_hash("0707070707070707070707070707070707070707", "Test")
            .unwrap()
    }

    fn test_key() -> StreamKey {
        StreamKey::new("tt0133093", "The Matrix", "720p")
    }

    #[tokio::test]
    async fn test_sources_tried_in_order_until_one_answers() {
        let (empty, empty_calls) = ScriptedIndex::new("a", Behavior::Empty);
        let (failing, failing_calls) = ScriptedIndex::new("b", Behavior::Fails);
        let (answering, answering_calls) =
            ScriptedIndex::new("c", Behavior::Returns(test_descriptor()));

        let chain = ResolverChain::new(vec![empty, failing, answering], &test_config());
        let descriptor = chain.resolve(&test_key()).await.unwrap();

        assert_eq!(descriptor, test_descriptor());
        assert_eq!(empty_calls.load(Ordering::SeqCst), 1);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(answering_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_resolution_skips_all_sources() {
        let (answering, answering_calls) =
            ScriptedIndex::new("a", Behavior::Returns(test_descriptor()));

        let chain = ResolverChain::new(vec![answering], &test_config());
        chain.resolve(&test_key()).await.unwrap();
        chain.resolve(&test_key()).await.unwrap();

        assert_eq!(answering_calls.load(Ordering::SeqCst), 1);
        assert_eq!(chain.cached_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_is_not_found_and_not_cached() {
        let (first, first_calls) = ScriptedIndex::new("a", Behavior::Empty);
        let (second, second_calls) = ScriptedIndex::new("b", Behavior::Fails);

        let chain = ResolverChain::new(vec![first, second], &test_config());
        let result = chain.resolve(&test_key()).await;
        assert!(matches!(result, Err(ResolveError::NotFound { .. })));
        assert_eq!(chain.cached_count(), 0);

        // A later request retries every source instead of replaying a miss.
        let result = chain.resolve(&test_key()).await;
        assert!(matches!(result, Err(ResolveError::NotFound { .. })));
        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
        assert_eq!(second_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_source_times_out_and_chain_moves_on() {
        let (hanging, _) = ScriptedIndex::new("a", Behavior::Hangs);
        let (answering, answering_calls) =
            ScriptedIndex::new("b", Behavior::Returns(test_descriptor()));

        let chain = ResolverChain::new(vec![hanging, answering], &test_config());
        let descriptor = chain.resolve(&test_key()).await.unwrap();

        assert_eq!(descriptor, test_descriptor());
        assert_eq!(answering_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_not_found() {
        let chain = ResolverChain::new(Vec::new(), &test_config());
        let result = chain.resolve(&test_key()).await;
        assert!(matches!(result, Err(ResolveError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_distinct_keys_resolve_independently() {
        let (answering, answering_calls) =
            ScriptedIndex::new("a", Behavior::Returns(test_descriptor()));

        let chain = ResolverChain::new(vec![answering], &test_config());
        chain.resolve(&test_key()).await.unwrap();
        chain
            .resolve(&StreamKey::new("tt0133093", "The Matrix", "1080p"))
            .await
            .unwrap();

        assert_eq!(answering_calls.load(Ordering::SeqCst), 2);
        assert_eq!(chain.cached_count(), 2);
    }
}
