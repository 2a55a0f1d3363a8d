//! Transfer state machine
//!
//! Upload direction:
//! - `begin_upload` creates the file and opens a session
//! - `update_upload` appends one chunk to the open session
//! - `end_upload` closes the session and notifies the coordinator
//! - `upload_whole` writes a complete file in one call under a reservation
//!
//! Download direction: every entry point returns the whole file.

use crate::common::{format_bytes, CallOrigin, NodeIdentity, Result};
use crate::datanode::notifier::UploadNotifier;
use crate::datanode::session::{SessionSummary, SessionTable};
use crate::datanode::store::LocalStore;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct TransferService {
    store: LocalStore,
    sessions: Arc<SessionTable>,
    notifier: UploadNotifier,
}

impl TransferService {
    pub fn new(
        identity: &NodeIdentity,
        storage_root: &Path,
        sessions: Arc<SessionTable>,
        notifier: UploadNotifier,
    ) -> Self {
        let store = LocalStore::new(storage_root, identity);
        Self {
            store,
            sessions,
            notifier,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    pub async fn begin_upload(&self, name: &str) -> Result<PathBuf> {
        let path = self.store.path_of(name)?;
        self.store.ensure_dir().await?;
        self.sessions.open(name, &path).await?;

        tracing::info!("Upload of {} started at {}", name, path.display());
        Ok(path)
    }

    pub async fn update_upload(&self, name: &str, chunk: &[u8]) -> Result<u64> {
        let written = self.sessions.append(name, chunk).await?;
        tracing::debug!(
            "Chunk of {} bytes written to {} ({} total)",
            chunk.len(),
            name,
            written
        );
        Ok(written)
    }

    pub async fn end_upload(&self, name: &str, origin: CallOrigin) -> Result<SessionSummary> {
        let summary = self.sessions.close(name).await?;
        tracing::info!(
            "Upload of {} finished: {} in {} chunk(s)",
            name,
            format_bytes(summary.bytes_written),
            summary.chunks
        );

        self.notifier.notify(name, &summary.path, origin);
        Ok(summary)
    }

    /// Single-shot upload. The name stays reserved for the whole write, so a
    /// concurrent begin or single-shot upload of it is refused, as is this
    /// call while a chunked upload owns the name.
    pub async fn upload_whole(
        &self,
        name: &str,
        content: &[u8],
        origin: CallOrigin,
    ) -> Result<PathBuf> {
        let reservation = self.sessions.reserve(name)?;
        let path = self.store.write_whole(name, content).await?;
        drop(reservation);

        tracing::info!(
            "File stored at {} ({})",
            path.display(),
            format_bytes(content.len() as u64)
        );

        self.notifier.notify(name, &path, origin);
        Ok(path)
    }

    pub async fn download(&self, name: &str) -> Result<Bytes> {
        let content = self.store.read(name).await?;
        tracing::info!("Serving {} ({})", name, format_bytes(content.len() as u64));
        Ok(content)
    }

    /// Abandon sessions idle longer than `max_idle`
    pub async fn reap_idle_sessions(&self, max_idle: Duration) -> usize {
        let reaped = self.sessions.reap_idle(max_idle).await;
        for (name, summary) in &reaped {
            tracing::warn!(
                "Abandoned idle upload of {} after {} bytes; partial file left at {}",
                name,
                summary.bytes_written,
                summary.path.display()
            );
        }
        reaped.len()
    }
}
