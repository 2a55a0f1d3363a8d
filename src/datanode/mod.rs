//! Data node implementation
//!
//! Handles file storage with:
//! - Chunked uploads tracked in a concurrent session table
//! - Whole-file uploads and downloads
//! - Chunk-by-chunk replication to peer nodes
//! - Heartbeats and upload notifications to the coordinator

pub mod client;
pub mod grpc;
pub mod heartbeat;
pub mod notifier;
pub mod replication;
pub mod server;
pub mod session;
pub mod store;
pub mod transfer;

pub use client::NodeClient;
pub use replication::{Peer, PeerOutcome, ReplicationJob, ReplicationReport, Replicator};
pub use server::{Listeners, NodeServer};
pub use session::SessionTable;
pub use transfer::TransferService;
