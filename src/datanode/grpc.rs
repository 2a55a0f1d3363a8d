//! DataNode gRPC service
//!
//! One service instance answers on all three listeners (client, peer and
//! coordinator facing). Handlers are thin: they unpack the request, call the
//! transfer state machine or the replicator, and map errors onto statuses.

use crate::common::{CallOrigin, Error};
use crate::datanode::replication::{ReplicationJob, Replicator};
use crate::datanode::transfer::TransferService;
use crate::proto::data_node_server::{DataNode, DataNodeServer};
use crate::proto::*;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct DataNodeGrpcService {
    transfer: Arc<TransferService>,
    replicator: Replicator,
    max_message_size: usize,
}

impl DataNodeGrpcService {
    pub fn new(
        transfer: Arc<TransferService>,
        replicator: Replicator,
        max_message_size: usize,
    ) -> Self {
        Self {
            transfer,
            replicator,
            max_message_size,
        }
    }

    /// A gRPC server over this shared instance; call once per listener.
    pub fn server(self: &Arc<Self>) -> DataNodeServer<Self> {
        DataNodeServer::from_arc(self.clone())
            .max_decoding_message_size(self.max_message_size)
            .max_encoding_message_size(self.max_message_size)
    }

    async fn download(
        &self,
        request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        let file_name = request.into_inner().file_name;
        tracing::info!("Download request for {}", file_name);

        let file_content = self.transfer.download(&file_name).await?;
        Ok(Response::new(FileDownloadResponse { file_content }))
    }
}

fn reply(message: impl Into<String>) -> Response<FileUploadResponse> {
    Response::new(FileUploadResponse {
        message: message.into(),
    })
}

#[tonic::async_trait]
impl DataNode for DataNodeGrpcService {
    /// Single-shot upload of a complete file.
    async fn upload_file(
        &self,
        request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let origin = CallOrigin::from_metadata(request.metadata());
        if origin.is_empty() {
            tracing::debug!("No origin metadata in upload request");
        }
        let req = request.into_inner();
        tracing::info!("Received upload request for {}", req.file_name);

        self.transfer
            .upload_whole(&req.file_name, &req.file_content, origin)
            .await?;
        Ok(reply("Upload successful"))
    }

    async fn begin_upload_file(
        &self,
        request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let req = request.into_inner();
        self.transfer.begin_upload(&req.file_name).await?;
        Ok(reply("Upload initiated"))
    }

    async fn update_upload_file(
        &self,
        request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let req = request.into_inner();
        self.transfer
            .update_upload(&req.file_name, &req.file_content)
            .await?;
        Ok(reply("Chunk received"))
    }

    async fn end_upload_file(
        &self,
        request: Request<FileUploadRequest>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let origin = CallOrigin::from_metadata(request.metadata());
        let req = request.into_inner();

        let summary = self.transfer.end_upload(&req.file_name, origin).await?;
        Ok(reply(format!(
            "Upload complete ({} bytes)",
            summary.bytes_written
        )))
    }

    async fn download_file(
        &self,
        request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        self.download(request).await
    }

    // The chunked download calls are not differentiated yet: each one
    // returns the whole file, same as `download_file`.

    async fn begin_download_file(
        &self,
        request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        self.download(request).await
    }

    async fn update_download_file(
        &self,
        request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        self.download(request).await
    }

    async fn end_download_file(
        &self,
        request: Request<FileDownloadRequest>,
    ) -> Result<Response<FileDownloadResponse>, Status> {
        self.download(request).await
    }

    /// Acknowledges unconditionally once the local file has been read;
    /// per-peer outcomes are only logged.
    async fn replicate(
        &self,
        request: Request<ReplicateRequest>,
    ) -> Result<Response<ReplicateResponse>, Status> {
        let job = ReplicationJob::from_request(request.into_inner())?;
        let report = self
            .replicator
            .replicate(&job)
            .await
            .map_err(|e| match e {
                Error::FileNotFound(path) => {
                    Status::not_found(format!("replication failed, cannot read file: {}", path))
                }
                other => other.to_grpc_status(),
            })?;

        tracing::info!(
            "Replication of {} done: {}/{} peer(s) complete",
            report.file_name,
            report.completed(),
            report.outcomes.len()
        );
        Ok(Response::new(ReplicateResponse {}))
    }
}
