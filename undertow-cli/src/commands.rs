//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use tracing::warn;
use undertow_core::config::UndertowConfig;
use undertow_core::streaming::MediaPipeline;
use undertow_core::swarm::{MemorySwarmConnector, SwarmCache, SwarmConnector};
use undertow_core::tracing_setup::{CliLogLevel, init_tracing};
use undertow_resolve::{ResolverChain, StreamKey};
use undertow_web::{AppState, run_server};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming delivery server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Directory of media files seeded into the in-memory swarm backend
        #[arg(long)]
        seed_dir: Option<PathBuf>,
        /// Console log level
        #[arg(long, default_value = "info")]
        log_level: CliLogLevel,
        /// ffmpeg binary used for remuxing
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,
    },
    /// Resolve a stream key against the index chain and print the magnet
    Resolve {
        /// External content identifier (IMDb id)
        id: String,
        /// Display title
        title: String,
        /// Requested quality label
        #[arg(long, default_value = "720p")]
        quality: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            seed_dir,
            log_level,
            ffmpeg,
        } => serve(host, port, seed_dir, log_level, ffmpeg).await,
        Commands::Resolve { id, title, quality } => resolve(id, title, quality).await,
    }
}

async fn serve(
    host: String,
    port: u16,
    seed_dir: Option<PathBuf>,
    log_level: CliLogLevel,
    ffmpeg: String,
) -> anyhow::Result<()> {
    init_tracing(log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let config = UndertowConfig::from_env();

    let connector: Arc<dyn SwarmConnector> = match seed_dir {
        Some(dir) => {
            let connector = MemorySwarmConnector::from_directory(&dir)
                .with_context(|| format!("failed to seed media from {}", dir.display()))?;
            Arc::new(connector)
        }
        None => {
            warn!("no --seed-dir given; in-memory swarm backend starts empty");
            Arc::new(MemorySwarmConnector::new(Vec::new()))
        }
    };

    let swarms = Arc::new(SwarmCache::new(
        connector,
        config.cache.clone(),
        config.swarm.connect_timeout,
    ));
    let resolver = Arc::new(ResolverChain::with_default_sources(&config.resolver)?);
    let pipeline = Arc::new(MediaPipeline::new(config.swarm.read_chunk_size).with_ffmpeg(ffmpeg));

    let state = AppState::new(resolver, swarms, pipeline, config);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid listen address")?;

    run_server(addr, state)
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {e}"))
}

async fn resolve(id: String, title: String, quality: String) -> anyhow::Result<()> {
    let config = UndertowConfig::from_env();
    let chain = ResolverChain::with_default_sources(&config.resolver)?;

    let key = StreamKey::new(id, title, quality);
    let descriptor = chain.resolve(&key).await?;

    println!("{}", descriptor.as_magnet());
    Ok(())
}
