//! # dfs-datanode
//!
//! Storage node of a distributed file store:
//! - Chunked uploads (begin / update / end) with one session per file name
//! - Single-shot uploads and whole-file downloads
//! - Replication of stored files to peer nodes, chunk by chunk
//! - Heartbeats and upload-completion notifications to the coordinator
//!
//! ## Architecture
//!
//! ```text
//!            ┌───────────────────────────┐
//!            │        Coordinator        │
//!            └──▲──────────┬─────────▲───┘
//!     KeepAlive │ Replicate│         │ NotifyUploaded
//!            ┌──┴──────────▼─────────┴───┐  begin/update/end  ┌───────────┐
//!  Client ──►│         Data node         ├───────────────────►│ Peer node │
//!            │  uploaded_<ip>_<port>/... │                    └───────────┘
//!            └───────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a data node
//! ```bash
//! dfs-datanode node.json
//! ```
//! with `node.json`:
//! ```json
//! { "id": 1, "client_port": ":9001", "peer_port": ":9002", "master_port": ":9003" }
//! ```
//!
//! ### Use the CLI
//! ```bash
//! dfs --node localhost:9001 upload report.pdf --file ./report.pdf --chunked
//! dfs --node localhost:9001 download report.pdf --output ./copy.pdf
//! ```

pub mod common;
pub mod coordinator;
pub mod datanode;
pub mod proto;

// Re-export commonly used types
pub use common::{DataNodeConfig, Error, NodeIdentity, Result};
pub use datanode::NodeServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
