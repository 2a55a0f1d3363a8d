//! Generates the `dfs.DataNode` and `dfs.Master` service stubs.
//!
//! Messages are hand-written prost structs in `src/proto/messages.rs`, so the
//! services are described with tonic-build's manual builder and no `protoc`
//! is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "dfs";
const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{}", input))
        .output_type(format!("crate::proto::{}", output))
        .codec_path(CODEC)
        .build()
}

fn main() {
    let upload = |name: &str, route: &str| {
        unary(name, route, "FileUploadRequest", "FileUploadResponse")
    };
    let download = |name: &str, route: &str| {
        unary(name, route, "FileDownloadRequest", "FileDownloadResponse")
    };

    let data_node = Service::builder()
        .name("DataNode")
        .package(PACKAGE)
        .method(upload("upload_file", "UploadFile"))
        .method(upload("begin_upload_file", "BeginUploadFile"))
        .method(upload("update_upload_file", "UpdateUploadFile"))
        .method(upload("end_upload_file", "EndUploadFile"))
        .method(download("download_file", "DownloadFile"))
        .method(download("begin_download_file", "BeginDownloadFile"))
        .method(download("update_download_file", "UpdateDownloadFile"))
        .method(download("end_download_file", "EndDownloadFile"))
        .method(unary(
            "replicate",
            "Replicate",
            "ReplicateRequest",
            "ReplicateResponse",
        ))
        .build();

    let master = Service::builder()
        .name("Master")
        .package(PACKAGE)
        .method(unary(
            "keep_alive",
            "KeepAlive",
            "KeepAliveRequest",
            "KeepAliveResponse",
        ))
        .method(unary(
            "notify_uploaded",
            "NotifyUploaded",
            "NotifyUploadedRequest",
            "NotifyUploadedResponse",
        ))
        .build();

    Builder::new().compile(&[data_node, master]);

    println!("cargo:rerun-if-changed=build.rs");
}
