//! Data node binary

use anyhow::Context;
use clap::Parser;
use dfs_datanode::{DataNodeConfig, NodeServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dfs-datanode")]
#[command(about = "Storage node for the distributed file store")]
#[command(version)]
struct Args {
    /// Node configuration file (JSON or TOML)
    config: PathBuf,

    /// Log level, overrides the config file (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = DataNodeConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let level = args.log_level.unwrap_or_else(|| config.log_level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let identity = config.identity();
    tracing::info!(
        "Data node {} at {} (client :{}, peer :{}, coordinator :{})",
        identity.id,
        identity.ip,
        identity.client_port,
        identity.peer_port,
        identity.master_port
    );

    NodeServer::new(config, identity).serve().await?;

    Ok(())
}
