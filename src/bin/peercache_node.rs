//! Cache node: serves the peer protocol for the configured groups, loading
//! origin values from `{data_dir}/{group}/{key}`.
//!
//! Run with:
//!   cargo run --bin peercache_node -- --addr 127.0.0.1:8001 \
//!       --peers http://127.0.0.1:8001,http://127.0.0.1:8002,http://127.0.0.1:8003
//! Then: curl http://127.0.0.1:8001/_mycache/scores/Tom

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use peercache::config::ConfigLoader;
use peercache::group::GroupRegistry;
use peercache::loader::FileLoader;
use peercache::peer::PeerPool;
use peercache::CacheGroup;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser, Serialize)]
#[command(name = "peercache_node", version, about = "Peer-to-peer read-through cache node")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    #[serde(skip)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8001
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    addr: Option<String>,

    /// This node's URL as it appears in --peers (default: http://ADDR)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    self_url: Option<String>,

    /// Comma-separated peer URLs, this node included
    #[arg(long, value_delimiter = ',')]
    #[serde(skip_serializing_if = "Option::is_none")]
    peers: Option<Vec<String>>,

    /// Directory holding origin values as {group}/{key} files
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    data_dir: Option<PathBuf>,
}

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,peercache=debug"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let config = loader.load_with(&cli)?;

    let registry = Arc::new(GroupRegistry::new());
    let pool = Arc::new(PeerPool::with_options(
        config.self_url(),
        config.pool_options(),
    )?);
    if !config.peers.is_empty() {
        pool.set_peers(config.peers.iter().cloned());
    }

    for group_config in &config.groups {
        let group = CacheGroup::builder(&group_config.name)
            .capacity(group_config.capacity)
            .shards(group_config.shards)
            .loader(FileLoader::new(&config.data_dir, &group_config.name))
            .build()?;
        group.register_peers(pool.clone())?;
        registry.register(group);
    }

    let app = pool.router(registry.clone());
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(
        addr = %listener.local_addr()?,
        self_url = %pool.self_addr(),
        peers = ?pool.peers(),
        groups = ?registry.names(),
        data_dir = %config.data_dir.display(),
        "cache node listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("cache node stopped");
    Ok(())
}
