//! Centralized configuration for Undertow.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Undertow components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct UndertowConfig {
    pub swarm: SwarmConfig,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
    pub http: HttpConfig,
}

/// Swarm attachment configuration.
///
/// Controls how sessions connect to peer swarms and how transfers behave.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Maximum peer connections per swarm session
    pub max_connections: usize,
    /// Maximum concurrent upload slots per swarm session
    pub max_uploads: usize,
    /// Timeout for the initial swarm handshake
    pub connect_timeout: Duration,
    /// Chunk size for session range reads
    pub read_chunk_size: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_uploads: 10,
            connect_timeout: Duration::from_secs(45),
            read_chunk_size: 65536, // 64 KiB
        }
    }
}

/// Session cache lifecycle configuration.
///
/// Controls how long idle swarm sessions stay alive and how often the
/// eviction sweep runs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Idle time after which a session is torn down
    pub session_ttl: Duration,
    /// Interval between eviction sweeps
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(30 * 60),  // 30 minutes
            sweep_interval: Duration::from_secs(5 * 60), // 5 minutes
        }
    }
}

/// Resolver chain configuration.
///
/// Controls per-index timeouts and the bounded resolution cache.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Timeout applied to each index lookup independently
    pub source_timeout: Duration,
    /// Capacity of the StreamKey -> descriptor resolution cache
    pub cache_capacity: usize,
    /// User agent for index HTTP requests
    pub user_agent: &'static str,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(10),
            cache_capacity: 512,
            user_agent: "undertow/0.1.0",
        }
    }
}

/// HTTP delivery configuration.
///
/// Chunk-size policy for open-ended range requests, per client class.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Chunk size for clients that require Range (mobile Safari family)
    pub mandatory_class_chunk: u64,
    /// Chunk size for all other clients
    pub default_chunk: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            mandatory_class_chunk: 1024 * 1024,    // 1 MiB
            default_chunk: 2 * 1024 * 1024,        // 2 MiB
        }
    }
}

impl UndertowConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ttl) = std::env::var("UNDERTOW_SESSION_TTL_SECS") {
            if let Ok(seconds) = ttl.parse::<u64>() {
                config.cache.session_ttl = Duration::from_secs(seconds);
            }
        }

        if let Ok(interval) = std::env::var("UNDERTOW_SWEEP_INTERVAL_SECS") {
            if let Ok(seconds) = interval.parse::<u64>() {
                config.cache.sweep_interval = Duration::from_secs(seconds);
            }
        }

        if let Ok(timeout) = std::env::var("UNDERTOW_SOURCE_TIMEOUT_SECS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.resolver.source_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(timeout) = std::env::var("UNDERTOW_CONNECT_TIMEOUT_SECS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.swarm.connect_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(max_peers) = std::env::var("UNDERTOW_MAX_PEERS") {
            if let Ok(count) = max_peers.parse::<usize>() {
                config.swarm.max_connections = count;
            }
        }

        config
    }

    /// Creates a configuration with short timers for cache tests.
    pub fn for_testing() -> Self {
        Self {
            cache: CacheConfig {
                session_ttl: Duration::from_millis(200),
                sweep_interval: Duration::from_millis(50),
            },
            ..Default::default()
        }
    }
}
