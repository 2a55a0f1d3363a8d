//! Error types for the data node

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Local storage ===
    #[error("cannot create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write to {} failed: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Upload sessions ===
    #[error("No active upload for {0}")]
    SessionNotFound(String),

    #[error("Upload already in progress for {0}")]
    SessionAlreadyOpen(String),

    // === Network ===
    #[error("Connection to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("Remote call failed: {0}")]
    RemoteCall(#[from] tonic::Status),

    // === Requests & config ===
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert to gRPC status for RPC responses
    pub fn to_grpc_status(&self) -> tonic::Status {
        use tonic::{Code, Status};
        match self {
            Error::FileNotFound(_) => Status::new(Code::NotFound, self.to_string()),
            Error::SessionNotFound(_) => Status::new(Code::FailedPrecondition, self.to_string()),
            Error::SessionAlreadyOpen(_) => Status::new(Code::AlreadyExists, self.to_string()),
            Error::InvalidFileName(_) | Error::InvalidArgument(_) => {
                Status::new(Code::InvalidArgument, self.to_string())
            }
            Error::Connect { .. } => Status::new(Code::Unavailable, self.to_string()),
            Error::RemoteCall(status) => status.clone(),
            _ => Status::new(Code::Internal, self.to_string()),
        }
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        e.to_grpc_status()
    }
}
