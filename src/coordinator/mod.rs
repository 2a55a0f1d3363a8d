//! Coordinator-facing side of the data node
//!
//! The coordinator (master) is an external process. This node only calls it:
//! - `KeepAlive` from the liveness reporter
//! - `NotifyUploaded` once a file is durable locally

pub mod client;

pub use client::CoordinatorClient;
