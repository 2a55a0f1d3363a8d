//! CLI for talking to a data node directly

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use dfs_datanode::common::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_SIZE};
use dfs_datanode::common::{format_bytes, CallOrigin};
use dfs_datanode::datanode::NodeClient;
use dfs_datanode::proto::ReplicateRequest;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dfs")]
#[command(about = "distributed file store data node CLI")]
#[command(version)]
struct Cli {
    /// Data node address
    #[arg(long, default_value = "localhost:9001")]
    node: String,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Upload {
        /// Name to store the file under
        name: String,

        /// Local file
        #[arg(long)]
        file: PathBuf,

        /// Use the begin/update/end protocol instead of one call
        #[arg(long)]
        chunked: bool,

        /// Chunk size in bytes for --chunked
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Download a stored file
    Download {
        /// Stored file name
        name: String,

        /// Output file
        #[arg(long)]
        output: PathBuf,
    },

    /// Ask the node to replicate one of its files to peers
    Replicate {
        /// Stored file name
        name: String,

        /// Path of the file on the node
        #[arg(long)]
        path: String,

        /// Peers as ip:port (repeatable)
        #[arg(long = "peer", required = true)]
        peers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut client = NodeClient::connect(
        &cli.node,
        Duration::from_millis(cli.connect_timeout_ms),
        DEFAULT_MAX_MESSAGE_SIZE,
    )
    .await?;
    let origin = CallOrigin::default();

    match cli.command {
        Commands::Upload {
            name,
            file,
            chunked,
            chunk_size,
        } => {
            let content = Bytes::from(
                tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("reading {}", file.display()))?,
            );
            let size = content.len() as u64;

            let message = if chunked {
                anyhow::ensure!(chunk_size > 0, "chunk size must be positive");
                client.begin_upload(&name, &origin).await?;
                for offset in (0..content.len()).step_by(chunk_size) {
                    let end = (offset + chunk_size).min(content.len());
                    client
                        .update_upload(&name, content.slice(offset..end), &origin)
                        .await?;
                }
                client.end_upload(&name, &origin).await?
            } else {
                client.upload_file(&name, content, &origin).await?
            };
            println!("{} ({})", message, format_bytes(size));
        }

        Commands::Download { name, output } => {
            let content = client.download(&name).await?;
            tokio::fs::write(&output, &content)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Downloaded {} to {} ({})",
                name,
                output.display(),
                format_bytes(content.len() as u64)
            );
        }

        Commands::Replicate { name, path, peers } => {
            let mut request = ReplicateRequest {
                file_name: name.clone(),
                file_path: path,
                ..Default::default()
            };
            for peer in &peers {
                let (ip, port) = peer
                    .rsplit_once(':')
                    .with_context(|| format!("peer {:?} is not ip:port", peer))?;
                request.ip_addresses.push(ip.to_string());
                request.port_numbers.push(
                    port.parse()
                        .with_context(|| format!("invalid port in {:?}", peer))?,
                );
            }

            client.replicate(request).await?;
            println!("Replication of {} requested to {} peer(s)", name, peers.len());
        }
    }

    Ok(())
}
