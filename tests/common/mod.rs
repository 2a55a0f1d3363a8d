//! Shared helpers: in-process data nodes and recording mock services

#![allow(dead_code)]

use dfs_datanode::common::CallOrigin;
use dfs_datanode::datanode::{Listeners, NodeClient, NodeServer};
use dfs_datanode::proto::data_node_server::{DataNode, DataNodeServer};
use dfs_datanode::proto::master_server::{Master, MasterServer};
use dfs_datanode::proto::*;
use dfs_datanode::DataNodeConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

pub async fn local_listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(check: impl FnMut() -> bool) -> bool {
    eventually_within(Duration::from_secs(2), check).await
}

pub async fn eventually_within(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

// === Data node under test ===

pub struct TestNode {
    pub config: DataNodeConfig,
    pub client_addr: SocketAddr,
    pub peer_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<dfs_datanode::Result<()>>,
}

impl TestNode {
    pub async fn start(id: i32, root: &Path, master: SocketAddr) -> Self {
        Self::start_with(id, root, master, |_| {}).await
    }

    pub async fn start_with(
        id: i32,
        root: &Path,
        master: SocketAddr,
        tweak: impl FnOnce(&mut DataNodeConfig),
    ) -> Self {
        let listeners = Listeners {
            client: local_listener().await,
            peer: local_listener().await,
            master: local_listener().await,
        };
        let client_addr = listeners.client.local_addr().unwrap();
        let peer_addr = listeners.peer.local_addr().unwrap();

        let mut config = DataNodeConfig::new(
            id,
            client_addr.port(),
            peer_addr.port(),
            listeners.master.local_addr().unwrap().port(),
        );
        config.ip = Some("127.0.0.1".into());
        config.master_addr = master.to_string();
        config.storage_root = root.to_path_buf();
        config.heartbeat_interval_ms = 60_000;
        tweak(&mut config);

        let identity = config.identity();
        let server = NodeServer::new(config.clone(), identity);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(server.serve_with_listeners(listeners, shutdown_rx));

        Self {
            config,
            client_addr,
            peer_addr,
            shutdown,
            task,
        }
    }

    pub async fn client(&self) -> NodeClient {
        NodeClient::connect(
            &self.client_addr.to_string(),
            Duration::from_secs(2),
            self.config.max_message_size,
        )
        .await
        .unwrap()
    }

    /// `<root>/uploaded_127.0.0.1_<client port>/<name>`
    pub fn stored_path(&self, name: &str) -> std::path::PathBuf {
        self.config
            .storage_root
            .join(format!("uploaded_127.0.0.1_{}", self.client_addr.port()))
            .join(name)
    }

    pub async fn stop(self) -> dfs_datanode::Result<()> {
        self.shutdown.send(true).unwrap();
        self.task.await.unwrap()
    }
}

// === Mock coordinator ===

#[derive(Debug, Clone)]
pub struct Notification {
    pub file_name: String,
    pub data_node: i32,
    pub file_path: String,
    pub origin: CallOrigin,
}

/// Records heartbeats and upload notifications. `notify_delay` holds every
/// `NotifyUploaded` call open for that long before recording it.
#[derive(Clone, Default)]
pub struct MockMaster {
    pub keep_alives: Arc<Mutex<Vec<KeepAliveRequest>>>,
    pub notifications: Arc<Mutex<Vec<Notification>>>,
    pub notify_delay: Option<Duration>,
}

impl MockMaster {
    pub fn slow_notifications(delay: Duration) -> Self {
        Self {
            notify_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn keep_alive_count(&self) -> usize {
        self.keep_alives.lock().unwrap().len()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[tonic::async_trait]
impl Master for MockMaster {
    async fn keep_alive(
        &self,
        request: Request<KeepAliveRequest>,
    ) -> Result<Response<KeepAliveResponse>, Status> {
        self.keep_alives.lock().unwrap().push(request.into_inner());
        Ok(Response::new(KeepAliveResponse {
            message: "ok".into(),
        }))
    }

    async fn notify_uploaded(
        &self,
        request: Request<NotifyUploadedRequest>,
    ) -> Result<Response<NotifyUploadedResponse>, Status> {
        let origin = CallOrigin::from_metadata(request.metadata());
        let req = request.into_inner();
        if let Some(delay) = self.notify_delay {
            tokio::time::sleep(delay).await;
        }
        self.notifications.lock().unwrap().push(Notification {
            file_name: req.file_name,
            data_node: req.data_node,
            file_path: req.file_path,
            origin,
        });
        Ok(Response::new(NotifyUploadedResponse {}))
    }
}

pub async fn spawn_master(master: MockMaster) -> SocketAddr {
    let listener = local_listener().await;
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(MasterServer::new(master))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

// === Mock peer ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCall {
    Begin(String),
    Update(String, Vec<u8>),
    End(String),
}

/// Records the upload protocol as seen by a peer. Optionally fails the
/// `fail_update_at`-th update call (0-based).
#[derive(Clone, Default)]
pub struct MockPeer {
    pub calls: Arc<Mutex<Vec<PeerCall>>>,
    pub fail_update_at: Option<usize>,
}

impl MockPeer {
    pub fn failing_update(at: usize) -> Self {
        Self {
            fail_update_at: Some(at),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PeerCall::Update(_, chunk) => Some(chunk),
                _ => None,
            })
            .collect()
    }

    pub fn received(&self) -> Vec<u8> {
        self.updates().concat()
    }

    pub fn ended(&self) -> bool {
        self.calls()
            .iter()
            .any(|call| matches!(call, PeerCall::End(_)))
    }
}

fn ack() -> Result<Response<FileUploadResponse>, Status> {
    Ok(Response::new(FileUploadResponse {
        message: "ok".into(),
    }))
}

#[tonic::async_trait]
impl DataNode for MockPeer {
    async fn upload_file(
        &self,
        _request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        Err(Status::unimplemented("mock peer"))
    }

    async fn begin_upload_file(
        &self,
        request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let name = request.into_inner().file_name;
        self.calls.lock().unwrap().push(PeerCall::Begin(name));
        ack()
    }

    async fn update_upload_file(
        &self,
        request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let req = request.into_inner();
        let mut calls = self.calls.lock().unwrap();
        let seen = calls
            .iter()
            .filter(|call| matches!(call, PeerCall::Update(..)))
            .count();
        if self.fail_update_at == Some(seen) {
            return Err(Status::internal("disk full"));
        }
        calls.push(PeerCall::Update(req.file_name, req.file_content.to_vec()));
        ack()
    }

    async fn end_upload_file(
        &self,
        request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let name = request.into_inner().file_name;
        self.calls.lock().unwrap().push(PeerCall::End(name));
        ack()
    }

    async fn download_file(
        &self,
        _request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        Err(Status::unimplemented("mock peer"))
    }

    async fn begin_download_file(
        &self,
        _request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        Err(Status::unimplemented("mock peer"))
    }

    async fn update_download_file(
        &self,
        _request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        Err(Status::unimplemented("mock peer"))
    }

    async fn end_download_file(
        &self,
        _request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        Err(Status::unimplemented("mock peer"))
    }

    async fn replicate(
        &self,
        _request: Request<ReplicateRequest>,
    ) -> Result<Response<ReplicateResponse>, Status> {
        Err(Status::unimplemented("mock peer"))
    }
}

pub async fn spawn_peer(peer: MockPeer) -> SocketAddr {
    let listener = local_listener().await;
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(DataNodeServer::new(peer))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

/// A port nothing listens on
pub async fn dead_addr() -> SocketAddr {
    let listener = local_listener().await;
    listener.local_addr().unwrap()
}
