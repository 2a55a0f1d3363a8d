//! Upload completion notifier
//!
//! Tells the coordinator a file is durable on this node. Each notification is
//! a detached task: the upload call that triggered it has already answered its
//! client, so failures are only logged.

use crate::common::CallOrigin;
use crate::coordinator::CoordinatorClient;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct UploadNotifier {
    master_addr: String,
    node_id: i32,
    connect_timeout: Duration,
}

impl UploadNotifier {
    pub fn new(master_addr: impl Into<String>, node_id: i32, connect_timeout: Duration) -> Self {
        Self {
            master_addr: master_addr.into(),
            node_id,
            connect_timeout,
        }
    }

    /// Fire a `NotifyUploaded` in the background. The handle may be dropped.
    pub fn notify(&self, file_name: &str, path: &Path, origin: CallOrigin) -> JoinHandle<()> {
        let notifier = self.clone();
        let file_name = file_name.to_string();
        let file_path = path.display().to_string();

        tokio::spawn(async move {
            if let Err(e) = notifier.send(file_name.clone(), file_path, &origin).await {
                tracing::warn!("Coordinator notification for {} failed: {}", file_name, e);
            }
        })
    }

    async fn send(
        &self,
        file_name: String,
        file_path: String,
        origin: &CallOrigin,
    ) -> crate::common::Result<()> {
        let mut client = CoordinatorClient::connect(&self.master_addr, self.connect_timeout).await?;
        client
            .notify_uploaded(file_name.clone(), self.node_id, file_path, origin)
            .await?;
        tracing::debug!("Coordinator notified of {}", file_name);
        Ok(())
    }
}
