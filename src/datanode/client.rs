use crate::common::{CallOrigin, Result};
use crate::coordinator::client::dial;
use crate::proto::data_node_client::DataNodeClient;
use crate::proto::*;
use bytes::Bytes;
use std::time::Duration;
use tonic::transport::Channel;

/// Typed client for another node's `dfs.DataNode` service
pub struct NodeClient {
    client: DataNodeClient<Channel>,
}

impl NodeClient {
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        max_message_size: usize,
    ) -> Result<Self> {
        let channel = dial(addr, connect_timeout).await?;
        let client = DataNodeClient::new(channel)
            .max_decoding_message_size(max_message_size)
            .max_encoding_message_size(max_message_size);
        Ok(Self { client })
    }

    pub async fn upload_file(
        &mut self,
        file_name: &str,
        content: Bytes,
        origin: &CallOrigin,
    ) -> Result<String> {
        let request = upload_request(file_name, content, origin);
        let response = self.client.upload_file(request).await?;
        Ok(response.into_inner().message)
    }

    pub async fn begin_upload(&mut self, file_name: &str, origin: &CallOrigin) -> Result<String> {
        let request = upload_request(file_name, Bytes::new(), origin);
        let response = self.client.begin_upload_file(request).await?;
        Ok(response.into_inner().message)
    }

    pub async fn update_upload(
        &mut self,
        file_name: &str,
        chunk: Bytes,
        origin: &CallOrigin,
    ) -> Result<String> {
        let request = upload_request(file_name, chunk, origin);
        let response = self.client.update_upload_file(request).await?;
        Ok(response.into_inner().message)
    }

    pub async fn end_upload(&mut self, file_name: &str, origin: &CallOrigin) -> Result<String> {
        let request = upload_request(file_name, Bytes::new(), origin);
        let response = self.client.end_upload_file(request).await?;
        Ok(response.into_inner().message)
    }

    pub async fn download(&mut self, file_name: &str) -> Result<Bytes> {
        let request = tonic::Request::new(FileDownloadRequest {
            file_name: file_name.to_string(),
        });
        let response = self.client.download_file(request).await?;
        Ok(response.into_inner().file_content)
    }

    pub async fn replicate(&mut self, request: ReplicateRequest) -> Result<()> {
        self.client.replicate(request).await?;
        Ok(())
    }
}

fn upload_request(
    file_name: &str,
    file_content: Bytes,
    origin: &CallOrigin,
) -> tonic::Request<FileUploadRequest> {
    let mut request = tonic::Request::new(FileUploadRequest {
        file_name: file_name.to_string(),
        file_content,
    });
    origin.apply(request.metadata_mut());
    request
}
