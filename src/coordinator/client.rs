use crate::common::{http_endpoint, CallOrigin, Error, NodeIdentity, Result};
use crate::proto::master_client::MasterClient;
use crate::proto::*;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// Typed client for the coordinator's `dfs.Master` service
pub struct CoordinatorClient {
    client: MasterClient<Channel>,
}

impl CoordinatorClient {
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let channel = dial(addr, connect_timeout).await?;
        Ok(Self {
            client: MasterClient::new(channel),
        })
    }

    pub async fn keep_alive(&mut self, identity: &NodeIdentity) -> Result<KeepAliveResponse> {
        let request = tonic::Request::new(KeepAliveRequest {
            data_node_ip: identity.ip.clone(),
            port_numbers: identity.port_numbers(),
            is_alive: true,
        });

        let response = self.client.keep_alive(request).await?;
        Ok(response.into_inner())
    }

    pub async fn notify_uploaded(
        &mut self,
        file_name: String,
        data_node: i32,
        file_path: String,
        origin: &CallOrigin,
    ) -> Result<()> {
        let mut request = tonic::Request::new(NotifyUploadedRequest {
            file_name,
            data_node,
            file_path,
        });
        origin.apply(request.metadata_mut());

        self.client.notify_uploaded(request).await?;
        Ok(())
    }
}

/// Open a channel to `addr`, bounded by `connect_timeout`.
pub(crate) async fn dial(addr: &str, connect_timeout: Duration) -> Result<Channel> {
    let url = http_endpoint(addr);
    let connect_error = |reason: String| Error::Connect {
        addr: url.clone(),
        reason,
    };

    let endpoint = Endpoint::from_shared(url.clone())
        .map_err(|e| connect_error(e.to_string()))?
        .connect_timeout(connect_timeout);

    endpoint
        .connect()
        .await
        .map_err(|e| connect_error(e.to_string()))
}
