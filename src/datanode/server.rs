//! Data node server
//!
//! Binds the client, peer and coordinator ports, serves the same DataNode
//! service on all three, and runs the background tasks (heartbeat, idle
//! session reaper) until shutdown.

use crate::common::{DataNodeConfig, NodeIdentity, Result};
use crate::datanode::grpc::DataNodeGrpcService;
use crate::datanode::heartbeat::LivenessReporter;
use crate::datanode::notifier::UploadNotifier;
use crate::datanode::replication::Replicator;
use crate::datanode::session::SessionTable;
use crate::datanode::transfer::TransferService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;

/// Bound sockets for the three roles
pub struct Listeners {
    pub client: TcpListener,
    pub peer: TcpListener,
    pub master: TcpListener,
}

impl Listeners {
    pub async fn bind(config: &DataNodeConfig) -> Result<Self> {
        let bind = |port: u16| TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)));
        Ok(Self {
            client: bind(config.client_port).await?,
            peer: bind(config.peer_port).await?,
            master: bind(config.master_port).await?,
        })
    }
}

pub struct NodeServer {
    config: DataNodeConfig,
    identity: NodeIdentity,
    service: Arc<DataNodeGrpcService>,
    transfer: Arc<TransferService>,
}

impl NodeServer {
    pub fn new(config: DataNodeConfig, identity: NodeIdentity) -> Self {
        let notifier = UploadNotifier::new(
            config.master_addr.clone(),
            identity.id,
            config.connect_timeout(),
        );
        let transfer = Arc::new(TransferService::new(
            &identity,
            &config.storage_root,
            Arc::new(SessionTable::new()),
            notifier,
        ));
        let replicator = Replicator::new(
            config.replication_chunk_size,
            config.connect_timeout(),
            config.max_message_size,
        );
        let service = Arc::new(DataNodeGrpcService::new(
            transfer.clone(),
            replicator,
            config.max_message_size,
        ));

        Self {
            config,
            identity,
            service,
            transfer,
        }
    }

    /// Bind the configured ports and serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listeners = Listeners::bind(&self.config).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let serving = tokio::spawn(self.serve_with_listeners(listeners, shutdown_rx));

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);

        match serving.await {
            Ok(result) => result,
            Err(e) => Err(crate::Error::Internal(format!("server task failed: {}", e))),
        }
    }

    /// Serve on already-bound listeners until `shutdown` flips to `true`
    pub async fn serve_with_listeners(
        self,
        listeners: Listeners,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!("Starting data node {}", self.identity.id);
        tracing::info!("  Client API: {}", listeners.client.local_addr()?);
        tracing::info!("  Peer API: {}", listeners.peer.local_addr()?);
        tracing::info!("  Coordinator API: {}", listeners.master.local_addr()?);
        tracing::info!("  Storage: {}", self.transfer.store().dir().display());
        tracing::info!("  Coordinator: {}", self.config.master_addr);

        self.transfer.store().ensure_dir().await?;

        let heartbeat = LivenessReporter::new(
            self.identity.clone(),
            self.config.master_addr.clone(),
            self.config.heartbeat_interval(),
            self.config.connect_timeout(),
        )
        .start(shutdown.clone());

        let reaper = self.config.session_idle_timeout().map(|max_idle| {
            start_session_reaper(self.transfer.clone(), max_idle, shutdown.clone())
        });

        let client = self.serve_listener(listeners.client, shutdown.clone());
        let peer = self.serve_listener(listeners.peer, shutdown.clone());
        let master = self.serve_listener(listeners.master, shutdown.clone());

        tracing::info!("✓ Data node ready");

        let result = tokio::try_join!(client, peer, master);

        // Listeners may also stop on error, without a shutdown signal.
        heartbeat.abort();
        if let Some(reaper) = reaper {
            reaper.abort();
        }

        match result {
            Ok(_) => {
                tracing::info!("Data node stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!("gRPC server error: {}", e);
                Err(crate::Error::Internal(e.to_string()))
            }
        }
    }

    async fn serve_listener(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::result::Result<(), tonic::transport::Error> {
        tonic::transport::Server::builder()
            .add_service(self.service.server())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
    }
}

/// Periodically abandon upload sessions idle longer than `max_idle`
fn start_session_reaper(
    transfer: Arc<TransferService>,
    max_idle: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = (max_idle / 4).max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reaped = transfer.reap_idle_sessions(max_idle).await;
                    if reaped > 0 {
                        tracing::info!("Reaped {} idle upload session(s)", reaped);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
