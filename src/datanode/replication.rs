//! Replication fan-out
//!
//! Pushes one local file to a list of peers, one peer at a time, using the
//! chunked upload protocol: begin, one update per chunk in offset order, end.
//!
//! Failures are isolated per peer. A peer that cannot be reached or that
//! rejects begin is skipped; a peer that fails a chunk gets no further chunks
//! and no end call, so it keeps a partial file. The outcome of every peer is
//! collected in a [`ReplicationReport`], but callers of the `Replicate` RPC
//! only ever see an empty acknowledgement.

use crate::common::{CallOrigin, Error, Result};
use crate::datanode::client::NodeClient;
use crate::datanode::store::read_file;
use crate::proto::ReplicateRequest;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A replication target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub ip: String,
    pub port: u16,
    pub id: Option<i32>,
}

impl Peer {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            id: None,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} (node {})", self.addr(), id),
            None => write!(f, "{}", self.addr()),
        }
    }
}

/// One `Replicate` call: which file, where it lives locally, where it goes
#[derive(Debug, Clone)]
pub struct ReplicationJob {
    pub file_name: String,
    pub file_path: PathBuf,
    pub peers: Vec<Peer>,
}

impl ReplicationJob {
    pub fn from_request(request: ReplicateRequest) -> Result<Self> {
        if request.ip_addresses.len() != request.port_numbers.len() {
            return Err(Error::InvalidArgument(format!(
                "{} ip addresses but {} port numbers",
                request.ip_addresses.len(),
                request.port_numbers.len()
            )));
        }

        let peers = request
            .ip_addresses
            .into_iter()
            .zip(request.port_numbers)
            .enumerate()
            .map(|(i, (ip, port))| -> Result<Peer> {
                let port = u16::try_from(port)
                    .ok()
                    .filter(|port| *port != 0)
                    .ok_or_else(|| Error::InvalidArgument(format!("invalid port {}", port)))?;
                Ok(Peer {
                    ip,
                    port,
                    id: request.ids.get(i).copied(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            file_name: request.file_name,
            file_path: PathBuf::from(request.file_path),
            peers,
        })
    }
}

/// How replication to a single peer ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerOutcome {
    /// Every chunk and the closing end call succeeded
    Completed { chunks: usize },
    ConnectFailed { reason: String },
    BeginFailed { reason: String },
    /// Chunk at `offset` failed; `chunks_sent` chunks made it before that
    ChunkFailed {
        offset: usize,
        chunks_sent: usize,
        reason: String,
    },
    /// All chunks went through but the end call failed
    EndFailed { chunks: usize, reason: String },
}

impl PeerOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, PeerOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ReplicationReport {
    pub file_name: String,
    pub total_bytes: usize,
    pub outcomes: Vec<(Peer, PeerOutcome)>,
}

impl ReplicationReport {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_complete())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

/// Drives the chunked upload protocol against peers
#[derive(Debug, Clone)]
pub struct Replicator {
    chunk_size: usize,
    connect_timeout: Duration,
    max_message_size: usize,
}

impl Replicator {
    pub fn new(chunk_size: usize, connect_timeout: Duration, max_message_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            connect_timeout,
            max_message_size,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Replicate `job` to every peer in order.
    ///
    /// Only a failure to read the local file is returned as an error; peer
    /// failures end up in the report.
    pub async fn replicate(&self, job: &ReplicationJob) -> Result<ReplicationReport> {
        tracing::info!(
            "Replicating {} to {} node(s)",
            job.file_name,
            job.peers.len()
        );

        let content = read_file(&job.file_path, &job.file_path.display().to_string()).await?;

        let mut outcomes = Vec::with_capacity(job.peers.len());
        for peer in &job.peers {
            let outcome = self.replicate_to_peer(&job.file_name, &content, peer).await;
            match &outcome {
                PeerOutcome::Completed { chunks } => tracing::info!(
                    "Replication of {} to {} completed ({} chunks)",
                    job.file_name,
                    peer,
                    chunks
                ),
                other => tracing::warn!(
                    "Replication of {} to {} failed: {:?}",
                    job.file_name,
                    peer,
                    other
                ),
            }
            outcomes.push((peer.clone(), outcome));
        }

        Ok(ReplicationReport {
            file_name: job.file_name.clone(),
            total_bytes: content.len(),
            outcomes,
        })
    }

    async fn replicate_to_peer(
        &self,
        file_name: &str,
        content: &Bytes,
        peer: &Peer,
    ) -> PeerOutcome {
        let origin = CallOrigin::default();

        let mut client =
            match NodeClient::connect(&peer.addr(), self.connect_timeout, self.max_message_size)
                .await
            {
                Ok(client) => client,
                Err(e) => {
                    return PeerOutcome::ConnectFailed {
                        reason: e.to_string(),
                    }
                }
            };

        if let Err(e) = client.begin_upload(file_name, &origin).await {
            return PeerOutcome::BeginFailed {
                reason: e.to_string(),
            };
        }
        tracing::debug!("Replication of {} started on {}", file_name, peer);

        let total = content.len();
        let mut chunks = 0;
        for offset in (0..total).step_by(self.chunk_size) {
            let end = (offset + self.chunk_size).min(total);
            if let Err(e) = client
                .update_upload(file_name, content.slice(offset..end), &origin)
                .await
            {
                return PeerOutcome::ChunkFailed {
                    offset,
                    chunks_sent: chunks,
                    reason: e.to_string(),
                };
            }
            chunks += 1;

            let progress = end as f64 / total as f64 * 100.0;
            tracing::debug!("Replication progress to {}: {:.2}%", peer, progress);
        }

        match client.end_upload(file_name, &origin).await {
            Ok(_) => PeerOutcome::Completed { chunks },
            Err(e) => PeerOutcome::EndFailed {
                chunks,
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(ips: &[&str], ports: &[i32], ids: &[i32]) -> ReplicateRequest {
        ReplicateRequest {
            file_name: "f.bin".into(),
            file_path: "uploaded_10.0.0.5_9001/f.bin".into(),
            ip_addresses: ips.iter().map(|ip| ip.to_string()).collect(),
            port_numbers: ports.to_vec(),
            ids: ids.to_vec(),
        }
    }

    #[test]
    fn test_job_from_request() {
        let job =
            ReplicationJob::from_request(request(&["10.0.0.6", "10.0.0.7"], &[9002, 9102], &[6]))
                .unwrap();

        assert_eq!(job.file_name, "f.bin");
        assert_eq!(job.file_path, PathBuf::from("uploaded_10.0.0.5_9001/f.bin"));
        assert_eq!(job.peers.len(), 2);
        assert_eq!(job.peers[0].addr(), "10.0.0.6:9002");
        assert_eq!(job.peers[0].id, Some(6));
        assert_eq!(job.peers[1].id, None);
    }

    #[test]
    fn test_job_rejects_mismatched_lists() {
        assert!(matches!(
            ReplicationJob::from_request(request(&["10.0.0.6"], &[], &[])),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_job_rejects_bad_port() {
        assert!(ReplicationJob::from_request(request(&["10.0.0.6"], &[70000], &[])).is_err());
        assert!(ReplicationJob::from_request(request(&["10.0.0.6"], &[-1], &[])).is_err());
        assert!(ReplicationJob::from_request(request(&["10.0.0.6"], &[0], &[])).is_err());
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let replicator = Replicator::new(4, Duration::from_millis(100), 1024);
        let job = ReplicationJob {
            file_name: "gone".into(),
            file_path: PathBuf::from("/nonexistent/dir/gone"),
            peers: vec![Peer::new("127.0.0.1", 1)],
        };

        assert!(matches!(
            replicator.replicate(&job).await,
            Err(Error::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let replicator = Replicator::new(4, Duration::from_millis(200), 1024);
        let job = ReplicationJob {
            file_name: "f.bin".into(),
            file_path: path,
            peers: vec![Peer::new("127.0.0.1", 1), Peer::new("127.0.0.1", 1)],
        };

        let report = replicator.replicate(&job).await.unwrap();
        assert_eq!(report.total_bytes, 10);
        assert_eq!(report.completed(), 0);
        assert_eq!(report.failed(), 2);
        assert!(report
            .outcomes
            .iter()
            .all(|(_, outcome)| matches!(outcome, PeerOutcome::ConnectFailed { .. })));
    }
}
