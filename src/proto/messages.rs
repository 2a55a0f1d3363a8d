//! Prost messages exchanged with clients, peers and the coordinator.

use bytes::Bytes;

/// Used by whole-file uploads and by every step of a chunked upload.
/// `file_content` is empty for begin/end.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FileUploadRequest {
    #[prost(string, tag = "1")]
    pub file_name: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub file_content: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileUploadResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileDownloadRequest {
    #[prost(string, tag = "1")]
    pub file_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileDownloadResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub file_content: Bytes,
}

/// Push `file_path` to every listed peer. The three repeated fields are
/// parallel arrays indexed by peer.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ReplicateRequest {
    #[prost(string, tag = "1")]
    pub file_name: String,
    #[prost(string, tag = "2")]
    pub file_path: String,
    #[prost(string, repeated, tag = "3")]
    pub ip_addresses: Vec<String>,
    #[prost(int32, repeated, tag = "4")]
    pub port_numbers: Vec<i32>,
    #[prost(int32, repeated, tag = "5")]
    pub ids: Vec<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReplicateResponse {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KeepAliveRequest {
    #[prost(string, tag = "1")]
    pub data_node_ip: String,
    /// `[":<master>", ":<client>", ":<peer>"]`
    #[prost(string, repeated, tag = "2")]
    pub port_numbers: Vec<String>,
    #[prost(bool, tag = "3")]
    pub is_alive: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KeepAliveResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NotifyUploadedRequest {
    #[prost(string, tag = "1")]
    pub file_name: String,
    #[prost(int32, tag = "2")]
    pub data_node: i32,
    #[prost(string, tag = "3")]
    pub file_path: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NotifyUploadedResponse {}
